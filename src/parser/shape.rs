//! Recognized line shapes of a PHP error log.
//!
//! Every physical line is classified into exactly one [`LineShape`]. The
//! entry parser only ever looks at shapes, so each shape can be tested on
//! its own.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use super::entry::{EntryKind, StackFrame};

/// Marker line that opens a stack-trace block.
pub const STACK_TRACE_MARKER: &str = "Stack trace:";

// The bracketed prefix must hold something time-like so that indented or
// column-0 `print_r` output (`[0] => 1`) never starts a new entry.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<ts>[^\]]*\d{1,2}:\d{2}[^\]]*)\](?:\s+(?P<rest>.*))?$")
        .expect("header pattern is valid")
});

static LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<php>PHP\s+)?(?P<level>[A-Za-z][A-Za-z ]*?):\s*(?P<msg>.*)$")
        .expect("level pattern is valid")
});

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?P<index>\d+)\s+(?P<detail>.*)$").expect("frame pattern is valid")
});

static FRAME_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>.+?)\((?P<line>\d+)\):").expect("frame location pattern is valid")
});

static NUMERIC_ZONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>[+-])(?P<hours>\d{2}):?(?P<minutes>\d{2})$")
        .expect("zone pattern is valid")
});

/// Level tokens PHP writes after the `PHP ` prefix, lowercased.
const LEVELS: &[(&str, EntryKind)] = &[
    ("fatal error", EntryKind::Error),
    ("parse error", EntryKind::Error),
    ("recoverable fatal error", EntryKind::Error),
    ("catchable fatal error", EntryKind::Error),
    ("core error", EntryKind::Error),
    ("compile error", EntryKind::Error),
    ("user error", EntryKind::Error),
    ("error", EntryKind::Error),
    ("warning", EntryKind::Warning),
    ("core warning", EntryKind::Warning),
    ("compile warning", EntryKind::Warning),
    ("user warning", EntryKind::Warning),
    ("notice", EntryKind::Notice),
    ("user notice", EntryKind::Notice),
    ("strict standards", EntryKind::Notice),
    ("deprecated", EntryKind::Deprecated),
    ("user deprecated", EntryKind::Deprecated),
];

/// Timestamp layouts tried in order, after the zone is split off.
const TIMESTAMP_FORMATS: &[&str] = &["%d-%b-%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parsed header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header<'a> {
    /// `None` when the bracketed timestamp could not be understood.
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: EntryKind,
    pub message: &'a str,
}

/// Classification of one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineShape<'a> {
    /// `[timestamp] PHP Level: message`
    Header(Header<'a>),
    /// `Stack trace:`
    TraceBegin,
    /// `#N detail`
    Frame(StackFrame),
    /// Whitespace only.
    Blank,
    /// Anything else; continuation text or noise depending on parser state.
    Text(&'a str),
}

impl<'a> LineShape<'a> {
    /// Classify a line. The line must not contain its terminator.
    #[must_use]
    pub fn classify(line: &'a str) -> Self {
        let line = line.trim_end();
        if line.is_empty() {
            return Self::Blank;
        }
        if line == STACK_TRACE_MARKER {
            return Self::TraceBegin;
        }
        if let Some(header) = parse_header(line) {
            return Self::Header(header);
        }
        if let Some(frame) = parse_frame(line) {
            return Self::Frame(frame);
        }
        Self::Text(line)
    }
}

/// Map a level token to an entry kind. Unrecognized tokens are `Unknown`.
#[must_use]
pub fn classify_level(token: &str) -> EntryKind {
    let token = token.trim().to_lowercase();
    LEVELS
        .iter()
        .find(|(name, _)| *name == token)
        .map_or(EntryKind::Unknown, |(_, kind)| *kind)
}

fn is_known_level(token: &str) -> bool {
    classify_level(token) != EntryKind::Unknown
}

fn parse_header(line: &str) -> Option<Header<'_>> {
    let caps = HEADER_RE.captures(line)?;
    let timestamp = caps.name("ts").and_then(|ts| parse_timestamp(ts.as_str()));
    let rest = caps.name("rest").map_or("", |m| m.as_str());

    let (kind, message) = match LEVEL_RE.captures(rest) {
        // With the `PHP ` prefix the token is a level even if we don't know it.
        Some(level) if level.name("php").is_some() || is_known_level(&level["level"]) => {
            let message = level.name("msg").map_or("", |m| m.as_str());
            (classify_level(&level["level"]), message)
        }
        _ => (EntryKind::Unknown, rest),
    };

    Some(Header {
        timestamp,
        kind,
        message: message.trim(),
    })
}

/// Parse a `#N detail` frame line.
///
/// `file_name` and `line_number` are only set when the detail has the
/// `path(line): call` shape; `{main}` and `[internal function]` frames keep
/// them unset.
#[must_use]
pub fn parse_frame(line: &str) -> Option<StackFrame> {
    let caps = FRAME_RE.captures(line.trim_end())?;
    let index = caps["index"].parse().ok()?;
    let detail = caps["detail"].trim().to_string();

    let (file_name, line_number) = match FRAME_LOCATION_RE.captures(&detail) {
        Some(loc) => (
            Some(loc["file"].trim().to_string()),
            loc["line"].parse().ok(),
        ),
        None => (None, None),
    };

    Some(StackFrame {
        index,
        detail,
        file_name,
        line_number,
    })
}

/// Parse the bracketed header timestamp into UTC.
///
/// Accepts PHP's `10-Jan-2024 10:00:00 UTC` layout, `2024-01-10 10:00:00`,
/// and RFC 3339. Named zones other than UTC/GMT are read in the host zone.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let mut parts = raw.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let zone: Vec<&str> = parts.collect();
    let zone = zone.join(" ");

    let stamp = format!("{date} {time}");
    let naive = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&stamp, fmt).ok())?;

    resolve_zone(naive, &zone)
}

fn resolve_zone(naive: NaiveDateTime, zone: &str) -> Option<DateTime<Utc>> {
    match zone {
        "UTC" | "GMT" | "Z" => Some(naive.and_utc()),
        "" => local_to_utc(naive),
        other => {
            if let Some(caps) = NUMERIC_ZONE_RE.captures(other) {
                let hours: i32 = caps["hours"].parse().ok()?;
                let minutes: i32 = caps["minutes"].parse().ok()?;
                let mut seconds = hours * 3600 + minutes * 60;
                if &caps["sign"] == "-" {
                    seconds = -seconds;
                }
                let offset = FixedOffset::east_opt(seconds)?;
                offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            } else {
                local_to_utc(naive)
            }
        }
    }
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc)),
    )
}
