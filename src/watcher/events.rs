//! Events published to the consumer.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::error::WatchError;
use crate::alert::AlertNotice;
use crate::parser::LogEntry;

/// Non-fatal condition of a watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchStatus {
    FileNotFound,
    PermissionDenied,
    NotAFile,
    ReadFailed { reason: String },
    /// Filesystem notifications are unavailable; only the timer polls.
    WatchUnavailable { reason: String },
    /// A previously reported condition has cleared.
    Resumed,
}

impl WatchStatus {
    /// Status for an error raised while reading.
    #[must_use]
    pub fn from_error(err: &WatchError) -> Self {
        match err {
            WatchError::NotFound(_) => Self::FileNotFound,
            WatchError::PermissionDenied(_) => Self::PermissionDenied,
            WatchError::NotAFile(_) => Self::NotAFile,
            other => Self::ReadFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound => f.write_str("file not found"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::NotAFile => f.write_str("not a regular file"),
            Self::ReadFailed { reason } => write!(f, "read failed: {reason}"),
            Self::WatchUnavailable { reason } => write!(f, "change notifications unavailable: {reason}"),
            Self::Resumed => f.write_str("watching resumed"),
        }
    }
}

/// Events emitted by the log watcher.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum WatchEvent {
    /// Discard everything shown so far for this file.
    Reset { path: PathBuf },
    /// Newly completed entries, in file order.
    EntriesAppended {
        path: PathBuf,
        entries: Vec<LogEntry>,
    },
    /// An error or warning that passed the throttle.
    Alert { notice: AlertNotice },
    /// Non-fatal condition; watching continues.
    Status {
        path: PathBuf,
        condition: WatchStatus,
    },
}
