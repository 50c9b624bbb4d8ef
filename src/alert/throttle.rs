//! Duplicate alert suppression.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::parser::{EntryKind, LogEntry};

/// Default time during which an identical alert is suppressed.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(3000);

/// The most recently surfaced alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastAlert {
    pub kind: EntryKind,
    pub first_line: String,
    pub at: Instant,
}

/// Decides whether a completed entry should raise an alert.
///
/// Only errors and warnings qualify. An entry whose kind and first message
/// line equal the last surfaced alert is suppressed while the cooldown
/// runs. There is a single slot shared by every kind and file.
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    cooldown: Duration,
    last_alert: Option<LastAlert>,
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl AlertThrottle {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: None,
        }
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    #[must_use]
    pub fn last_alert(&self) -> Option<&LastAlert> {
        self.last_alert.as_ref()
    }

    /// Decide for `entry` at time `now`, recording it when approved.
    pub fn should_alert(&mut self, entry: &LogEntry, now: Instant) -> bool {
        if !entry.kind.is_alertable() {
            return false;
        }

        let first_line = entry.first_line();
        if let Some(last) = &self.last_alert {
            let same = last.kind == entry.kind && last.first_line == first_line;
            if same && now.saturating_duration_since(last.at) < self.cooldown {
                tracing::debug!(
                    id = %entry.id,
                    kind = %entry.kind,
                    "Suppressing duplicate alert"
                );
                return false;
            }
        }

        self.last_alert = Some(LastAlert {
            kind: entry.kind,
            first_line: first_line.to_string(),
            at: now,
        });
        true
    }
}

/// Throttle shared by every session of the process.
#[derive(Debug, Clone, Default)]
pub struct SharedThrottle(Arc<Mutex<AlertThrottle>>);

impl SharedThrottle {
    #[must_use]
    pub fn new(throttle: AlertThrottle) -> Self {
        Self(Arc::new(Mutex::new(throttle)))
    }

    /// See [`AlertThrottle::should_alert`].
    pub fn should_alert(&self, entry: &LogEntry, now: Instant) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .should_alert(entry, now)
    }
}
