use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detector::DetectorConfig;

/// Persisted scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerSettings {
    pub enabled: bool,
    pub min_length: usize,
    pub max_typing_speed_ms: u64,
    pub end_timeout_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        let d = DetectorConfig::default();
        Self {
            enabled: d.enabled,
            min_length: d.min_length,
            max_typing_speed_ms: d.max_typing_speed_ms,
            end_timeout_ms: d.end_timeout_ms,
        }
    }
}

impl From<&ScannerSettings> for DetectorConfig {
    fn from(s: &ScannerSettings) -> Self {
        Self {
            enabled: s.enabled,
            min_length: s.min_length,
            max_typing_speed_ms: s.max_typing_speed_ms,
            end_timeout_ms: s.end_timeout_ms,
        }
    }
}

pub trait SettingsStore {
    fn load(&self) -> ScannerSettings;
    fn save(&self, settings: &ScannerSettings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "keywedge") {
            pd.config_dir().join("settings.json")
        } else {
            PathBuf::from("keywedge_settings.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> ScannerSettings {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(settings) = serde_json::from_slice::<ScannerSettings>(&bytes) {
                return settings;
            }
        }
        ScannerSettings::default()
    }

    fn save(&self, settings: &ScannerSettings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
