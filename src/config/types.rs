//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::{DEFAULT_BODY_LIMIT, DEFAULT_COOLDOWN};

/// Alert settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Raise alerts for errors and warnings.
    pub enabled: bool,
    /// Suppress identical alerts within this many milliseconds.
    pub cooldown_ms: u64,
    /// Maximum characters of the alert body.
    pub body_limit: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: u64::try_from(DEFAULT_COOLDOWN.as_millis()).unwrap_or(3000),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl AlertConfig {
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Settings for watching a log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// File watched when none is given on the command line.
    pub log_path: Option<PathBuf>,
    /// Read existing content on first attach instead of starting at the end.
    pub from_beginning: bool,
    /// Debounce window for filesystem notifications.
    pub debounce_ms: u64,
    /// Timer fallback between polls.
    pub poll_interval_ms: u64,
    /// Quiet time after which a still-open entry is published.
    pub settle_ms: u64,
    pub alerts: AlertConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            from_beginning: false,
            debounce_ms: 100,
            poll_interval_ms: 1000,
            settle_ms: 500,
            alerts: AlertConfig::default(),
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Never zero, so the fallback timer cannot spin.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
