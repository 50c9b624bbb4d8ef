//! Watcher module tests.

mod session_test;

use std::io::Write;
use std::path::Path;

/// Append `text` to `path`, creating the file if needed.
pub fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log for append");
    file.write_all(text.as_bytes()).expect("append to log");
}

pub const FATAL: &str =
    "[10-Jan-2024 10:00:00 UTC] PHP Fatal error:  Uncaught Exception: boom in /app/index.php:12\n\
     Stack trace:\n\
     #0 /app/index.php(12): run()\n\
     #1 {main}\n";

pub const WARNING: &str =
    "[10-Jan-2024 10:00:05 UTC] PHP Warning:  Undefined variable $bar in /app/lib.php on line 5\n";

pub const NOTICE: &str = "[10-Jan-2024 11:00:00 UTC] PHP Notice:  fyi\n";

/// Verify all public watcher types are exported from the library.
#[test]
fn test_all_watcher_types_exported() {
    use php_log_watch::watcher::{
        truncate_file, Chunk, FileIdentity, LineAssembler, LogWatcher, PollOutcome,
        RawChunkReader, WatchError, WatchEvent, WatchSession, WatchStatus,
    };

    let _ = LineAssembler::new();
    let reader = RawChunkReader::with_offset("/tmp/error.log".into(), 7);
    assert_eq!(reader.offset(), 7);
    assert!(reader.identity().is_none());
    assert!(PollOutcome::default().is_empty());

    let _: fn() -> WatchError = || WatchError::NotWatching;
    let _ = WatchStatus::Resumed;
    let _: Option<(Chunk, FileIdentity, WatchEvent)> = None;
    let _: Option<(LogWatcher, WatchSession)> = None;
    let _ = truncate_file;
}
