//! Line-driven state machine grouping lines into log entries.

use chrono::{DateTime, Utc};

use super::entry::{EntryId, LogEntry};
use super::shape::{Header, LineShape};

/// Where the parser is within the current entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserState {
    /// Between entries, or past the end of a stack-trace block.
    #[default]
    AwaitingHeader,
    /// After a header; plain lines extend the message.
    InMessage,
    /// After `Stack trace:`; frame lines extend the trace.
    InStackTrace,
}

/// Groups classified lines into [`LogEntry`] records.
///
/// The entry being built is held across calls and only returned once a
/// following header closes it, or when the caller asks for it with
/// [`EntryParser::finish`].
#[derive(Debug)]
pub struct EntryParser {
    state: ParserState,
    open: Option<LogEntry>,
    next_id: u64,
}

impl Default for EntryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingHeader,
            open: None,
            next_id: 1,
        }
    }

    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Id the next header will receive.
    #[must_use]
    pub fn next_id(&self) -> EntryId {
        EntryId(self.next_id)
    }

    /// The entry currently being built, if any.
    #[must_use]
    pub fn open_entry(&self) -> Option<&LogEntry> {
        self.open.as_ref()
    }

    /// Feed one line, using the current time as the fallback timestamp.
    pub fn push_line(&mut self, line: &str) -> Option<LogEntry> {
        self.push_line_at(line, Utc::now())
    }

    /// Feed one line. Returns the entry this line closed, if any.
    ///
    /// `now` is used as the timestamp of a header whose own timestamp
    /// cannot be parsed.
    pub fn push_line_at(&mut self, line: &str, now: DateTime<Utc>) -> Option<LogEntry> {
        match LineShape::classify(line) {
            LineShape::Header(header) => {
                let closed = self.open.take();
                self.open_entry_from(&header, now);
                closed
            }
            LineShape::Blank => None,
            LineShape::TraceBegin => {
                if self.open.is_some() {
                    self.transition(ParserState::InStackTrace);
                } else {
                    tracing::trace!("Dropping stack trace marker with no open entry");
                }
                None
            }
            LineShape::Frame(frame) => {
                match (self.state, self.open.as_mut()) {
                    (ParserState::InStackTrace, Some(entry)) => entry.stack_frames.push(frame),
                    (_, Some(entry)) => entry.append_line(line.trim_end()),
                    (_, None) => tracing::trace!(line, "Dropping orphan frame line"),
                }
                None
            }
            LineShape::Text(text) => {
                if self.state == ParserState::InStackTrace {
                    // The trace block is over; the entry stays open so trailing
                    // text such as `thrown in ...` still belongs to it.
                    self.transition(ParserState::AwaitingHeader);
                }
                match self.open.as_mut() {
                    Some(entry) => entry.append_line(text),
                    None => tracing::trace!(line = text, "Dropping line outside any entry"),
                }
                None
            }
        }
    }

    /// Feed several lines, collecting every entry they close.
    pub fn push_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> Vec<LogEntry> {
        let now = Utc::now();
        lines
            .into_iter()
            .filter_map(|line| self.push_line_at(line, now))
            .collect()
    }

    /// Close and return the open entry, if any.
    pub fn finish(&mut self) -> Option<LogEntry> {
        self.transition(ParserState::AwaitingHeader);
        self.open.take()
    }

    /// Drop all state and restart ids at 1.
    pub fn reset(&mut self) {
        self.state = ParserState::AwaitingHeader;
        self.open = None;
        self.next_id = 1;
    }

    fn open_entry_from(&mut self, header: &Header<'_>, now: DateTime<Utc>) {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.open = Some(LogEntry {
            id,
            kind: header.kind,
            timestamp: header.timestamp.unwrap_or(now),
            timestamp_approximate: header.timestamp.is_none(),
            message: header.message.to_string(),
            stack_frames: Vec::new(),
        });
        self.transition(ParserState::InMessage);
    }

    fn transition(&mut self, to: ParserState) {
        if self.state != to {
            tracing::trace!(from = ?self.state, to = ?to, "Parser state transition");
            self.state = to;
        }
    }
}
