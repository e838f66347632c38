use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Timestamps kept per burst; older entries are dropped first.
pub const TIMESTAMP_HISTORY_CAP: usize = 20;

/// Thresholds for telling scanner bursts apart from human typing.
///
/// Read once at construction. Changing thresholds on a live detector is not
/// supported; build a new detector (or re-attach a listener) instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    /// Master switch; a disabled detector ignores every event.
    pub enabled: bool,
    /// Minimum number of accepted characters for a valid barcode.
    pub min_length: usize,
    /// Maximum mean inter-keystroke interval (ms) still treated as scanner speed.
    pub max_typing_speed_ms: u64,
    /// Idle time (ms) after the last keystroke before the buffer is flushed.
    pub end_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: 8,
            max_typing_speed_ms: 50,
            end_timeout_ms: 100,
        }
    }
}

/// A keystroke as seen by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKey {
    Char(char),
    /// End-of-scan marker sent by most wedge scanners; forces a flush.
    Enter,
    /// Anything else (arrows, modifiers, function keys); never buffered.
    Other,
}

/// Where a keystroke was aimed when it reached the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    /// No text-entry widget owns the keyboard.
    Global,
    /// A text field owns the keystroke; the detector must not consume it.
    TextEntry,
}

/// Classifies bursts of keystrokes as scanner input or human typing.
///
/// The detector is clock-agnostic: callers pass a monotonic millisecond
/// timestamp to [`on_key`](Self::on_key) and drive the idle flush by calling
/// [`poll`](Self::poll) once [`deadline`](Self::deadline) has passed. This
/// keeps the classification logic testable without real timers.
#[derive(Debug)]
pub struct BurstDetector {
    config: DetectorConfig,
    buffer: String,
    timestamps: Vec<u64>,
    deadline: Option<u64>,
}

impl BurstDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            timestamps: Vec::new(),
            deadline: None,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// True while a burst is being accumulated.
    pub fn is_accumulating(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// The instant (ms) at which a pending burst should be flushed, if any.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Feed one keystroke observed at `now_ms`.
    ///
    /// Returns the decoded barcode when this keystroke completed a burst that
    /// classified as scanner input (only Enter can do that synchronously).
    pub fn on_key(&mut self, key: ScanKey, target: KeyTarget, now_ms: u64) -> Option<String> {
        if !self.config.enabled || target == KeyTarget::TextEntry {
            return None;
        }

        match key {
            ScanKey::Enter => {
                self.deadline = None;
                self.flush()
            }
            ScanKey::Char(c) if c.is_ascii_alphanumeric() => {
                // A long gap means this keystroke starts an unrelated burst.
                if let Some(&last) = self.timestamps.last() {
                    if now_ms.saturating_sub(last) > 3 * self.config.end_timeout_ms {
                        self.buffer.clear();
                        self.timestamps.clear();
                    }
                }

                self.buffer.push(c);
                self.timestamps.push(now_ms);
                if self.timestamps.len() > TIMESTAMP_HISTORY_CAP {
                    let excess = self.timestamps.len() - TIMESTAMP_HISTORY_CAP;
                    self.timestamps.drain(..excess);
                }

                self.deadline = Some(now_ms + self.config.end_timeout_ms);
                None
            }
            _ => None,
        }
    }

    /// Fire the idle flush if `now_ms` has reached the pending deadline.
    pub fn poll(&mut self, now_ms: u64) -> Option<String> {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Drop any in-progress burst and cancel the pending flush.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.timestamps.clear();
        self.deadline = None;
    }

    /// Classify the buffered burst, then reset unconditionally.
    fn flush(&mut self) -> Option<String> {
        let emitted = self.classify();
        self.buffer.clear();
        self.timestamps.clear();
        self.deadline = None;
        emitted
    }

    fn classify(&self) -> Option<String> {
        if self.buffer.len() < self.config.min_length {
            return None;
        }
        // A single timestamp yields no interval; inconclusive, not an error.
        if self.timestamps.len() < 2 {
            return None;
        }

        let intervals: Vec<u64> = self
            .timestamps
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .collect();
        let avg = intervals.iter().sum::<u64>() as f64 / intervals.len() as f64;

        if avg > self.config.max_typing_speed_ms as f64 {
            debug!(avg_interval_ms = avg, "human-speed typing ignored");
            return None;
        }

        let cleaned: String = self
            .buffer
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let cleaned = cleaned.trim().to_string();
        if cleaned.len() < self.config.min_length {
            return None;
        }

        debug!(code = %cleaned, avg_interval_ms = avg, "scanner burst detected");
        Some(cleaned)
    }
}
