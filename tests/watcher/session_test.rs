//! Integration tests for incremental session polling.

use std::time::{Duration, Instant};

use php_log_watch::parser::{EntryId, EntryKind, ParserState};
use php_log_watch::watcher::{WatchSession, WatchStatus};
use tempfile::TempDir;

use super::{append, FATAL, NOTICE, WARNING};

const NEVER_SETTLE: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn repeated_polls_without_new_bytes_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");
    append(&path, FATAL);
    append(&path, WARNING);

    let mut session = WatchSession::start(path, true, NEVER_SETTLE).await.unwrap();
    let first = session.poll().await;
    assert_eq!(first.entries.len(), 1);
    let offset = session.byte_offset();

    for _ in 0..3 {
        let outcome = session.poll().await;
        assert!(outcome.is_empty());
        assert_eq!(session.byte_offset(), offset);
        assert_eq!(session.next_entry_id(), EntryId(3));
    }
}

#[tokio::test]
async fn split_write_is_completed_by_next_poll() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");
    std::fs::File::create(&path).unwrap();

    let mut session = WatchSession::start(path.clone(), false, NEVER_SETTLE)
        .await
        .unwrap();

    let (head, tail) = FATAL.split_at(40);
    append(&path, head);
    let outcome = session.poll().await;
    assert!(outcome.entries.is_empty());
    assert_eq!(session.pending_fragment(), head.as_bytes());
    assert_eq!(session.parser_state(), ParserState::AwaitingHeader);

    append(&path, tail);
    let outcome = session.poll().await;
    assert!(outcome.entries.is_empty());
    assert!(session.pending_fragment().is_empty());
    assert_eq!(session.parser_state(), ParserState::InStackTrace);

    append(&path, WARNING);
    let outcome = session.poll().await;
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].stack_frames.len(), 2);
    assert_eq!(
        session.open_entry().map(|e| e.kind),
        Some(EntryKind::Warning)
    );
}

#[tokio::test]
async fn open_entry_published_after_settle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");
    append(&path, FATAL);
    append(&path, WARNING);

    let settle = Duration::from_millis(500);
    let mut session = WatchSession::start(path, true, settle).await.unwrap();

    let t0 = Instant::now();
    let outcome = session.poll_at(t0).await;
    assert_eq!(outcome.entries.len(), 1);

    let outcome = session.poll_at(t0 + Duration::from_millis(100)).await;
    assert!(outcome.entries.is_empty());

    let outcome = session.poll_at(t0 + settle).await;
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].kind, EntryKind::Warning);
    assert!(session.open_entry().is_none());

    let outcome = session.poll_at(t0 + settle * 2).await;
    assert!(outcome.is_empty());
}

#[tokio::test]
async fn truncation_emits_one_reset_and_restarts_ids() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");
    append(&path, FATAL);
    append(&path, WARNING);

    let mut session = WatchSession::start(path.clone(), true, NEVER_SETTLE)
        .await
        .unwrap();
    let outcome = session.poll().await;
    assert_eq!(outcome.entries[0].id, EntryId(1));

    std::fs::write(&path, "").unwrap();
    append(&path, NOTICE);

    let outcome = session.poll().await;
    assert!(outcome.reset);
    assert!(outcome.entries.is_empty());
    assert_eq!(session.byte_offset(), NOTICE.len() as u64);

    let outcome = session.poll().await;
    assert!(!outcome.reset);

    let notice = session.flush().unwrap();
    assert_eq!(notice.id, EntryId(1));
    assert_eq!(notice.kind, EntryKind::Notice);
}

#[tokio::test]
async fn replacement_by_rename_is_a_rotation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");
    append(&path, FATAL);

    let mut session = WatchSession::start(path.clone(), false, NEVER_SETTLE)
        .await
        .unwrap();
    assert!(session.poll().await.is_empty());

    // Longer than the old file, so only the identity change reveals it.
    let fresh = dir.path().join("php_errors.log.new");
    append(&fresh, &format!("{FATAL}{FATAL}{WARNING}"));
    std::fs::rename(&fresh, &path).unwrap();

    let outcome = session.poll().await;
    assert!(outcome.reset);
    let ids: Vec<u64> = outcome.entries.iter().map(|e| e.id.0).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn missing_file_reports_status_once_then_resumes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");

    let mut session = WatchSession::start(path.clone(), false, NEVER_SETTLE)
        .await
        .unwrap();

    let outcome = session.poll().await;
    assert_eq!(outcome.status, Some(WatchStatus::FileNotFound));
    assert!(session.poll().await.is_empty());

    append(&path, FATAL);
    append(&path, WARNING);
    let outcome = session.poll().await;
    assert_eq!(outcome.status, Some(WatchStatus::Resumed));
    assert!(!outcome.reset);
    assert_eq!(outcome.entries.len(), 1);
}

#[tokio::test]
async fn directory_is_rejected_at_start() {
    let dir = TempDir::new().unwrap();
    let result = WatchSession::start(dir.path().to_path_buf(), false, NEVER_SETTLE).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn emptied_file_refilled_past_old_offset_still_resets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("php_errors.log");
    append(&path, WARNING);

    let mut session = WatchSession::start(path.clone(), true, NEVER_SETTLE)
        .await
        .unwrap();
    session.poll().await;
    assert_eq!(session.flush().map(|e| e.kind), Some(EntryKind::Warning));

    std::fs::write(&path, "").unwrap();
    session.mark_truncated();
    // Longer than the old content: size and identity alone cannot tell.
    append(&path, FATAL);
    assert!(FATAL.len() > WARNING.len());

    let outcome = session.poll().await;
    assert!(outcome.reset);
    assert_eq!(session.byte_offset(), FATAL.len() as u64);

    let fatal = session.flush().unwrap();
    assert_eq!(fatal.id, EntryId(1));
    assert_eq!(fatal.kind, EntryKind::Error);
    assert!(fatal.message.starts_with("Uncaught Exception: boom"));

    assert!(!session.poll().await.reset);
}
