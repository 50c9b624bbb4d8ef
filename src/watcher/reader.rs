//! Incremental raw byte reader.
//!
//! Reads bytes appended to a file since the last read and notices when the
//! file has been truncated or replaced.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::WatchError;

/// Identity of the file behind a path, used to spot replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    created: Option<std::time::SystemTime>,
}

impl FileIdentity {
    #[cfg(unix)]
    #[must_use]
    pub fn of(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn of(metadata: &Metadata) -> Self {
        Self {
            created: metadata.created().ok(),
        }
    }
}

/// Bytes returned by one read.
#[derive(Debug, Default)]
pub struct Chunk {
    /// Newly appended bytes, possibly empty.
    pub bytes: Vec<u8>,
    /// The file was truncated or replaced; `bytes` start at offset 0.
    pub rotated: bool,
}

/// Reads newly appended bytes from a file at a tracked byte offset.
#[derive(Debug)]
pub struct RawChunkReader {
    path: PathBuf,
    /// Last fully consumed byte position.
    offset: u64,
    /// Identity recorded at attach time or at the last rotation.
    identity: Option<FileIdentity>,
    /// The file was seen and then went missing.
    vanished: bool,
}

impl RawChunkReader {
    /// Attach to `path`.
    ///
    /// Starts at end-of-file unless `from_beginning` is set. A path that does
    /// not exist yet is accepted; reading starts at 0 once it appears.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but is not a regular file, or
    /// cannot be opened for reading.
    pub async fn attach(path: PathBuf, from_beginning: bool) -> Result<Self, WatchError> {
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Log file does not exist yet");
                return Ok(Self {
                    path,
                    offset: 0,
                    identity: None,
                    vanished: false,
                });
            }
            Err(e) => return Err(WatchError::from_io(&path, e)),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(WatchError::NotAFile(path));
        }

        let offset = if from_beginning { 0 } else { metadata.len() };
        tracing::debug!(path = %path.display(), offset, "Attached reader");

        Ok(Self {
            path,
            offset,
            identity: Some(FileIdentity::of(&metadata)),
            vanished: false,
        })
    }

    /// Create a reader at a specific offset without touching the filesystem.
    #[must_use]
    pub fn with_offset(path: PathBuf, offset: u64) -> Self {
        Self {
            path,
            offset,
            identity: None,
            vanished: false,
        }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    /// Restart from offset 0 after the file was emptied through this
    /// process, keeping the recorded identity.
    pub fn restart(&mut self) {
        self.offset = 0;
        self.vanished = false;
    }

    /// Read bytes appended since the last read.
    ///
    /// If the file shrank below the tracked offset, was replaced by another
    /// file, or disappeared and came back, the offset restarts at 0 and the
    /// returned chunk is marked `rotated`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read. The offset is
    /// left untouched so the next call retries.
    pub async fn read_new(&mut self) -> Result<Chunk, WatchError> {
        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) => {
                let err = WatchError::from_io(&self.path, e);
                if matches!(err, WatchError::NotFound(_)) && self.identity.is_some() {
                    self.vanished = true;
                }
                return Err(err);
            }
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(WatchError::NotAFile(self.path.clone()));
        }
        let file_len = metadata.len();
        let identity = FileIdentity::of(&metadata);

        let replaced = self.vanished || self.identity.is_some_and(|known| known != identity);
        let truncated = file_len < self.offset;
        let rotated = replaced || truncated;

        if rotated {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                replaced,
                "Log file rotated, reading from start"
            );
            self.offset = 0;
        }
        self.identity = Some(identity);
        self.vanished = false;

        if file_len == self.offset {
            return Ok(Chunk {
                bytes: Vec::new(),
                rotated,
            });
        }

        file.seek(std::io::SeekFrom::Start(self.offset)).await?;
        let mut bytes = Vec::new();
        file.take(file_len - self.offset)
            .read_to_end(&mut bytes)
            .await?;
        self.offset += bytes.len() as u64;

        tracing::trace!(
            path = %self.path.display(),
            read = bytes.len(),
            offset = self.offset,
            "Read appended bytes"
        );

        Ok(Chunk { bytes, rotated })
    }
}
