//! Structured log entry types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Separator used to join continuation lines into a single message.
pub const MESSAGE_SEPARATOR: &str = "\n";

/// Identity of an entry within one watch session.
///
/// Ids start at 1 and increase by one for every header seen. They restart
/// only when the session is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity class of an entry, derived from the header's level token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Error,
    Warning,
    Notice,
    Deprecated,
    #[default]
    Unknown,
}

impl EntryKind {
    /// Lowercase name, as used in serialized output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Deprecated => "deprecated",
            Self::Unknown => "unknown",
        }
    }

    /// Whether entries of this kind may raise an alert.
    #[must_use]
    pub fn is_alertable(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `#N ...` line of a stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// Frame number as printed, kept verbatim.
    pub index: u32,
    /// Frame text after the `#N ` marker.
    pub detail: String,
    /// Source file, when the detail has the `file(line): call` shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Source line, when the detail has the `file(line): call` shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// One logical record of the PHP error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub timestamp: DateTime<Utc>,
    /// Set when the header timestamp could not be parsed and
    /// `timestamp` holds the ingestion time instead.
    #[serde(default)]
    pub timestamp_approximate: bool,
    pub message: String,
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
}

impl LogEntry {
    /// First physical line of the message.
    #[must_use]
    pub fn first_line(&self) -> &str {
        self.message.split(MESSAGE_SEPARATOR).next().unwrap_or_default()
    }

    #[must_use]
    pub fn has_stack_trace(&self) -> bool {
        !self.stack_frames.is_empty()
    }

    /// Case-insensitive search over the message and the frame details.
    ///
    /// An empty query matches everything.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.message.to_lowercase().contains(&needle)
            || self
                .stack_frames
                .iter()
                .any(|frame| frame.detail.to_lowercase().contains(&needle))
    }

    /// Whether the entry is older than `age` relative to `now`.
    #[must_use]
    pub fn is_older_than(&self, now: DateTime<Utc>, age: Duration) -> bool {
        self.timestamp < now - age
    }

    pub(crate) fn append_line(&mut self, line: &str) {
        if self.message.is_empty() {
            self.message.push_str(line);
        } else {
            self.message.push_str(MESSAGE_SEPARATOR);
            self.message.push_str(line);
        }
    }
}
