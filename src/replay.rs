//! Keystroke scripts for reproducing scans without scanner hardware.
//!
//! One event per line: `<delay_ms> <key>` where `<key>` is a single character
//! or the word `Enter`. The delay is relative to the previous event. `#`
//! starts a comment; blank lines are skipped.
//!
//! ```text
//! # a 4-char prefix typed at scanner speed, terminated by Enter
//! 0 7
//! 10 8
//! 10 9
//! 10 1
//! 5 Enter
//! ```

use thiserror::Error;

use crate::detector::{BurstDetector, DetectorConfig, KeyTarget, ScanKey};

#[derive(Debug, Error, PartialEq)]
pub enum ReplayParseError {
    #[error("line {line}: expected '<delay_ms> <key>', got {text:?}")]
    Malformed { line: usize, text: String },
    #[error("line {line}: delay {text:?} is not a number of milliseconds")]
    BadDelay { line: usize, text: String },
    #[error("line {line}: key must be a single character or 'Enter', got {text:?}")]
    BadKey { line: usize, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStep {
    /// Milliseconds since the previous step.
    pub delay_ms: u64,
    pub key: ScanKey,
}

pub fn parse_script(text: &str) -> Result<Vec<ReplayStep>, ReplayParseError> {
    let mut steps = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let (delay, key) = match (parts.next(), parts.next(), parts.next()) {
            (Some(delay), Some(key), None) => (delay, key),
            _ => {
                return Err(ReplayParseError::Malformed {
                    line,
                    text: trimmed.to_string(),
                })
            }
        };

        let delay_ms = delay.parse::<u64>().map_err(|_| ReplayParseError::BadDelay {
            line,
            text: delay.to_string(),
        })?;

        let key = if key.eq_ignore_ascii_case("enter") {
            ScanKey::Enter
        } else {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ScanKey::Char(c),
                _ => {
                    return Err(ReplayParseError::BadKey {
                        line,
                        text: key.to_string(),
                    })
                }
            }
        };

        steps.push(ReplayStep { delay_ms, key });
    }

    Ok(steps)
}

/// Drive a fresh detector through `steps` on a virtual clock and collect the
/// emitted codes. Idle flushes fire at their exact deadlines, including one
/// final flush after the last step.
pub fn run_script(steps: &[ReplayStep], config: DetectorConfig) -> Vec<String> {
    let mut detector = BurstDetector::new(config);
    let mut codes = Vec::new();
    let mut now: u64 = 0;

    for step in steps {
        now += step.delay_ms;
        if let Some(code) = detector.poll(now) {
            codes.push(code);
        }
        if let Some(code) = detector.on_key(step.key, KeyTarget::Global, now) {
            codes.push(code);
        }
    }

    now += config.end_timeout_ms;
    if let Some(code) = detector.poll(now) {
        codes.push(code);
    }

    codes
}
