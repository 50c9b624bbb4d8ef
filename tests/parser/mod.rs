//! Parser module tests.

mod parser_test;

/// Verify all public parser types are exported from the library.
#[test]
fn test_all_parser_types_exported() {
    use php_log_watch::parser::{
        classify_level, parse_all, parse_frame, parse_timestamp, EntryId, EntryKind, EntryParser,
        LineShape, LogEntry, ParserState, StackFrame, MESSAGE_SEPARATOR, STACK_TRACE_MARKER,
    };

    let parser = EntryParser::new();
    assert_eq!(parser.state(), ParserState::AwaitingHeader);
    assert_eq!(parser.next_id(), EntryId(1));

    assert_eq!(classify_level("Fatal error"), EntryKind::Error);
    assert!(parse_frame("#0 {main}").is_some());
    assert!(parse_timestamp("not a time").is_none());
    assert!(matches!(LineShape::classify(STACK_TRACE_MARKER), LineShape::TraceBegin));
    assert_eq!(MESSAGE_SEPARATOR, "\n");

    let _: fn(&str) -> Vec<LogEntry> = parse_all;
    let _: Option<StackFrame> = None;
}
