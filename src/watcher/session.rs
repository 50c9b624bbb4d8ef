//! Tailing state for one watched file.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::assembler::LineAssembler;
use super::error::WatchError;
use super::events::WatchStatus;
use super::reader::RawChunkReader;
use crate::parser::{EntryId, EntryParser, LogEntry, ParserState};

/// Result of one poll.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// The file was truncated or replaced; state restarted from offset 0.
    pub reset: bool,
    /// Entries completed by this poll, in file order.
    pub entries: Vec<LogEntry>,
    /// Condition entered or cleared by this poll.
    pub status: Option<WatchStatus>,
}

impl PollOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.reset && self.entries.is_empty() && self.status.is_none()
    }
}

/// Incremental consumption of one log file.
///
/// Chains [`RawChunkReader`], [`LineAssembler`] and [`EntryParser`]. The
/// entry being built stays inside the parser between polls and is only
/// published once a later header closes it, or once the file has been
/// quiet for the settle period.
#[derive(Debug)]
pub struct WatchSession {
    reader: RawChunkReader,
    assembler: LineAssembler,
    parser: EntryParser,
    settle: Duration,
    last_activity: Instant,
    condition: Option<WatchStatus>,
    /// Emptied by us; the next poll reports a reset.
    reset_pending: bool,
}

impl WatchSession {
    /// Start tailing `path`.
    ///
    /// With `from_beginning` unset the existing content is skipped. A path
    /// that does not exist yet is accepted and read once it appears.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a regular file or is unreadable.
    pub async fn start(
        path: PathBuf,
        from_beginning: bool,
        settle: Duration,
    ) -> Result<Self, WatchError> {
        let reader = RawChunkReader::attach(path, from_beginning).await?;
        tracing::info!(
            path = %reader.path().display(),
            offset = reader.offset(),
            "Watch session started"
        );
        Ok(Self {
            reader,
            assembler: LineAssembler::new(),
            parser: EntryParser::new(),
            settle,
            last_activity: Instant::now(),
            condition: None,
            reset_pending: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Last fully consumed byte position.
    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        self.reader.offset()
    }

    #[must_use]
    pub fn pending_fragment(&self) -> &[u8] {
        self.assembler.pending()
    }

    #[must_use]
    pub fn parser_state(&self) -> ParserState {
        self.parser.state()
    }

    #[must_use]
    pub fn next_entry_id(&self) -> EntryId {
        self.parser.next_id()
    }

    #[must_use]
    pub fn open_entry(&self) -> Option<&LogEntry> {
        self.parser.open_entry()
    }

    /// Poll using the current time.
    pub async fn poll(&mut self) -> PollOutcome {
        self.poll_at(Instant::now()).await
    }

    /// Read whatever was appended since the last poll and parse it.
    ///
    /// Read failures never escape: they are turned into a status, reported
    /// once per condition, and the next poll retries.
    pub async fn poll_at(&mut self, now: Instant) -> PollOutcome {
        let mut outcome = PollOutcome {
            reset: std::mem::take(&mut self.reset_pending),
            ..PollOutcome::default()
        };

        let chunk = match self.reader.read_new().await {
            Ok(chunk) => chunk,
            Err(err) => {
                let status = WatchStatus::from_error(&err);
                if self.condition.as_ref() != Some(&status) {
                    tracing::warn!(
                        path = %self.path().display(),
                        error = %err,
                        "Cannot read log file, will retry"
                    );
                    self.condition = Some(status.clone());
                    outcome.status = Some(status);
                }
                return outcome;
            }
        };

        if self.condition.take().is_some() {
            tracing::info!(path = %self.path().display(), "Log file readable again");
            outcome.status = Some(WatchStatus::Resumed);
        }

        if chunk.rotated {
            self.reset_state();
            outcome.reset = true;
        }

        if chunk.bytes.is_empty() {
            if !self.assembler.has_pending()
                && now.saturating_duration_since(self.last_activity) >= self.settle
            {
                outcome.entries.extend(self.parser.finish());
            }
        } else {
            self.last_activity = now;
            outcome.entries = self.feed(&chunk.bytes);
        }

        if !outcome.entries.is_empty() {
            tracing::debug!(
                path = %self.path().display(),
                count = outcome.entries.len(),
                offset = self.byte_offset(),
                "Parsed entries"
            );
        }
        outcome
    }

    /// Push raw bytes through line assembly and parsing.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LogEntry> {
        let lines = self.assembler.push(bytes);
        self.parser.push_lines(lines.iter().map(String::as_str))
    }

    /// Record that the file was emptied, so bytes written afterwards are read
    /// from offset 0 even if they already reach the old offset.
    ///
    /// The next poll reports `reset`.
    pub fn mark_truncated(&mut self) {
        self.reader.restart();
        self.reset_state();
        self.reset_pending = true;
        tracing::debug!(path = %self.path().display(), "Log file emptied, session restarted");
    }

    /// Publish the open entry without waiting for the settle period.
    pub fn flush(&mut self) -> Option<LogEntry> {
        self.parser.finish()
    }

    fn reset_state(&mut self) {
        self.assembler.reset();
        self.parser.reset();
    }
}
