//! Colored terminal output and plain-text renderings of log entries.

use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use owo_colors::OwoColorize;

use crate::alert::AlertNotice;
use crate::parser::{EntryKind, LogEntry};
use crate::watcher::WatchStatus;

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 160;

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Day label relative to `now`, in the host time zone.
///
/// `TODAY`, then `<n>D AGO`, `<n>W AGO`, `<n>M AGO`, `<n>Y AGO`.
#[must_use]
pub fn relative_day(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    relative_day_in(ts, now, &Local)
}

fn relative_day_in<Tz: TimeZone>(ts: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> String {
    if ts.with_timezone(tz).date_naive() == now.with_timezone(tz).date_naive() {
        return "TODAY".to_string();
    }

    let elapsed = now - ts;
    if elapsed <= Duration::zero() {
        return "TODAY".to_string();
    }
    // Partial days round up.
    let day_ms = Duration::days(1).num_milliseconds();
    let days = (elapsed.num_milliseconds() + day_ms - 1) / day_ms;

    if days < 7 {
        format!("{days}D AGO")
    } else if days < 30 {
        format!("{}W AGO", days / 7)
    } else if days < 365 {
        format!("{}M AGO", days / 30)
    } else {
        format!("{}Y AGO", days / 365)
    }
}

/// `HH:MM:SS` in the host time zone.
#[must_use]
pub fn time_only(ts: DateTime<Utc>) -> String {
    time_only_in(ts, &Local)
}

fn time_only_in<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format("%H:%M:%S").to_string()
}

/// Plain text of entries with kind labels and indented frames.
#[must_use]
pub fn format_raw(entries: &[LogEntry], now: DateTime<Utc>) -> String {
    format_raw_in(entries, now, &Local)
}

fn format_raw_in<Tz: TimeZone>(entries: &[LogEntry], now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    entries
        .iter()
        .map(|entry| {
            let mut text = format!(
                "[{}] {} - [{}] {}",
                relative_day_in(entry.timestamp, now, tz),
                time_only_in(entry.timestamp, tz),
                entry.kind.as_str().to_uppercase(),
                entry.message
            );
            for frame in &entry.stack_frames {
                text.push_str("\n  ");
                text.push_str(&frame.detail);
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text used when copying entries: one paragraph per entry.
#[must_use]
pub fn format_copy(entries: &[LogEntry], now: DateTime<Utc>) -> String {
    format_copy_in(entries, now, &Local)
}

fn format_copy_in<Tz: TimeZone>(entries: &[LogEntry], now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    entries
        .iter()
        .map(|entry| {
            format!(
                "[{}] {} - {}",
                relative_day_in(entry.timestamp, now, tz),
                time_only_in(entry.timestamp, tz),
                entry.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn kind_label(kind: EntryKind) -> String {
    let label = format!("[{}]", kind.as_str().to_uppercase());
    match kind {
        EntryKind::Error => label.red().bold().to_string(),
        EntryKind::Warning => label.yellow().bold().to_string(),
        EntryKind::Notice => label.blue().bold().to_string(),
        EntryKind::Deprecated => label.magenta().bold().to_string(),
        EntryKind::Unknown => label.bold().to_string(),
    }
}

/// Print one entry. Entries older than a day are dimmed.
pub fn print_entry(entry: &LogEntry, now: DateTime<Utc>, raw_mode: bool) {
    let when = format!(
        "{} {}",
        relative_day(entry.timestamp, now),
        time_only(entry.timestamp)
    );
    let approx = if entry.timestamp_approximate { "~" } else { "" };
    let message = if raw_mode {
        entry.message.clone()
    } else {
        truncate(entry.first_line(), DEFAULT_MAX_LEN)
    };
    let message = if entry.is_older_than(now, Duration::days(1)) {
        message.dimmed().to_string()
    } else {
        message
    };

    print!(
        "{} {} {}",
        format!("{approx}{when}").dimmed(),
        kind_label(entry.kind),
        message
    );
    if entry.has_stack_trace() && !raw_mode {
        print!(" {}", format!("({} frames)", entry.stack_frames.len()).dimmed());
    }
    println!();

    if raw_mode {
        for frame in &entry.stack_frames {
            println!("  {} {}", format!("#{}", frame.index).dimmed(), frame.detail);
        }
    }
    let _ = io::stdout().flush();
}

/// Print a reset marker.
pub fn print_reset(path: &Path) {
    println!("{} {}", "[RESET]".cyan().bold(), path.display());
    let _ = io::stdout().flush();
}

/// Print a status change.
pub fn print_status(path: &Path, condition: &WatchStatus) {
    let label = match condition {
        WatchStatus::Resumed => "[STATUS]".green().bold().to_string(),
        _ => "[STATUS]".yellow().bold().to_string(),
    };
    println!("{} {} {}", label, condition, path.display().dimmed());
    let _ = io::stdout().flush();
}

/// Print an approved alert.
pub fn print_alert(notice: &AlertNotice) {
    println!(
        "{} {}: {}",
        "[ALERT]".red().bold(),
        notice.title.bold(),
        notice.body
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
