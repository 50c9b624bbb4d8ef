//! PHP error log parsing.
//!
//! Turns complete text lines into structured [`LogEntry`] records,
//! including multi-line messages and `Stack trace:` blocks.

mod entry;
mod machine;
mod shape;

pub use entry::{EntryId, EntryKind, LogEntry, StackFrame, MESSAGE_SEPARATOR};
pub use machine::{EntryParser, ParserState};
pub use shape::{
    classify_level, parse_frame, parse_timestamp, Header, LineShape, STACK_TRACE_MARKER,
};

/// Parse a complete log text in one go, including its final entry.
///
/// Used for one-shot reads; watching goes through the incremental
/// pipeline instead.
#[must_use]
pub fn parse_all(text: &str) -> Vec<LogEntry> {
    let mut parser = EntryParser::new();
    let mut entries = parser.push_lines(text.lines());
    entries.extend(parser.finish());
    entries
}
