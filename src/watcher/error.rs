//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while tailing a log file.
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    /// Watched file does not exist (yet, or any more).
    #[error("Log file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path exists but is not a regular file.
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation requires an active session.
    #[error("No log file is being watched")]
    NotWatching,

    /// Event receiver dropped.
    #[error("Channel closed")]
    ChannelClosed,
}

impl WatchError {
    /// Classify an I/O error raised while touching `path`.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}
