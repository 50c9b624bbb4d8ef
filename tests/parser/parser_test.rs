//! Integration tests for line assembly and entry parsing.

use chrono::{TimeZone, Utc};
use php_log_watch::parser::{parse_all, EntryKind, EntryParser, LogEntry, ParserState};
use php_log_watch::watcher::LineAssembler;

const SAMPLE: &str = "\
[10-Jan-2024 10:00:00 UTC] PHP Fatal error:  Uncaught Exception: boom in /app/src/Kernel.php:42
while handling request /checkout
with user 17
Stack trace:
#0 /app/src/Kernel.php(42): App\\Kernel->handle()
#1 /app/public/index.php(20): App\\Kernel->run()
#2 {main}
[10-Jan-2024 10:00:05 UTC] PHP Warning:  Undefined variable $cart in /app/src/Cart.php on line 8
";

/// Feed `chunks` through the assembler and parser the way a session does.
fn parse_chunks(chunks: &[&[u8]]) -> Vec<LogEntry> {
    let mut assembler = LineAssembler::new();
    let mut parser = EntryParser::new();
    let mut entries = Vec::new();
    for chunk in chunks {
        let lines = assembler.push(chunk);
        entries.extend(parser.push_lines(lines.iter().map(String::as_str)));
    }
    entries.extend(parser.finish());
    entries
}

#[test]
fn parsing_is_independent_of_chunk_boundaries() {
    let bytes = SAMPLE.as_bytes();
    let whole = parse_chunks(&[bytes]);
    assert_eq!(whole.len(), 2);

    for split in 0..=bytes.len() {
        let (head, tail) = bytes.split_at(split);
        let parts = parse_chunks(&[head, tail]);
        assert_eq!(parts, whole, "split at byte {split}");
    }
}

#[test]
fn parsing_byte_by_byte_matches_whole_read() {
    let bytes = SAMPLE.as_bytes();
    let single: Vec<&[u8]> = bytes.chunks(1).collect();
    assert_eq!(parse_chunks(&single), parse_chunks(&[bytes]));
}

#[test]
fn uncaught_exception_with_trace() {
    let entries = parse_all(SAMPLE);
    let fatal = &entries[0];

    assert_eq!(fatal.kind, EntryKind::Error);
    assert_eq!(
        fatal.timestamp,
        Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()
    );
    assert!(!fatal.timestamp_approximate);
    assert_eq!(
        fatal.first_line(),
        "Uncaught Exception: boom in /app/src/Kernel.php:42"
    );
    assert_eq!(fatal.message.lines().count(), 3);
    assert_eq!(fatal.stack_frames.len(), 3);

    let first = &fatal.stack_frames[0];
    assert_eq!(first.index, 0);
    assert_eq!(first.file_name.as_deref(), Some("/app/src/Kernel.php"));
    assert_eq!(first.line_number, Some(42));

    let main = &fatal.stack_frames[2];
    assert_eq!(main.index, 2);
    assert_eq!(main.detail, "{main}");
    assert!(main.file_name.is_none());
    assert!(main.line_number.is_none());
}

#[test]
fn main_frame_alone() {
    let entries = parse_all(
        "[10-Jan-2024 10:00:00 UTC] PHP Fatal error: boom\nStack trace:\n#1 {main}\n",
    );
    assert_eq!(entries.len(), 1);
    let frame = &entries[0].stack_frames[0];
    assert_eq!(frame.index, 1);
    assert_eq!(frame.detail, "{main}");
    assert_eq!(frame.file_name, None);
}

#[test]
fn ids_increase_in_file_order() {
    let entries = parse_all(SAMPLE);
    let ids: Vec<u64> = entries.iter().map(|e| e.id.0).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn last_entry_stays_open_until_next_header() {
    let mut assembler = LineAssembler::new();
    let mut parser = EntryParser::new();

    let lines = assembler.push(SAMPLE.as_bytes());
    let closed = parser.push_lines(lines.iter().map(String::as_str));

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].kind, EntryKind::Error);
    assert_eq!(parser.state(), ParserState::InMessage);
    assert_eq!(
        parser.open_entry().map(|e| e.kind),
        Some(EntryKind::Warning)
    );
}

#[test]
fn lines_before_first_header_are_dropped() {
    let entries = parse_all(
        "garbage\n#0 orphan frame\nStack trace:\n[10-Jan-2024 10:00:00 UTC] PHP Notice: hi\n",
    );
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Notice);
    assert_eq!(entries[0].message, "hi");
}

#[test]
fn crlf_line_endings() {
    let text = SAMPLE.replace('\n', "\r\n");
    let crlf = parse_chunks(&[text.as_bytes()]);
    assert_eq!(crlf, parse_chunks(&[SAMPLE.as_bytes()]));
}

#[test]
fn unparseable_timestamp_is_approximate() {
    let before = Utc::now();
    let entries = parse_all("[sometime 25:99] PHP Warning: odd clock\n");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].timestamp_approximate);
    assert!(entries[0].timestamp >= before);
}
