//! Alert payload shown to the user.

use serde::Serialize;

use crate::parser::{EntryKind, LogEntry};

/// Default body length. Desktop notification bodies are cut near 256 bytes.
pub const DEFAULT_BODY_LIMIT: usize = 250;

/// An approved alert with its display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertNotice {
    pub entry: LogEntry,
    /// `PHP Error`, `PHP Warning`, ...
    pub title: String,
    /// First message line, cut to the body limit.
    pub body: String,
}

impl AlertNotice {
    #[must_use]
    pub fn new(entry: LogEntry, body_limit: usize) -> Self {
        let title = title_for(entry.kind);
        let body = entry.first_line().chars().take(body_limit).collect();
        Self { entry, title, body }
    }
}

fn title_for(kind: EntryKind) -> String {
    let name = kind.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("PHP {}{}", first.to_uppercase(), chars.as_str()),
        None => "PHP".to_string(),
    }
}
