#![allow(clippy::unwrap_used, clippy::expect_used)]

use celbridge_core::errors::{CommandError, ExError, ExErrorKind};
use celbridge_core::logging_facility::test_capture::init_test_capture;
use celbridge_core::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_COMPONENT, FIELD_DURATION_MS, FIELD_ERR_CODE,
    FIELD_ERR_KIND, FIELD_OPERATION_ID,
};
use celbridge_core::{log_op_end, log_op_error, log_op_start, OperationId};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let start_events: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_START))
        .collect();

    assert!(
        !start_events.is_empty(),
        "Should have captured at least one start event"
    );
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field(FIELD_DURATION_MS), Some("42"));
}

#[test]
fn test_log_op_error_accepts_command_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = CommandError::DuplicateOperation {
        operation_id: OperationId::from_string("op-dup".to_string()),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let error_event = capture
        .events_for_op(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_DUPLICATE_OPERATION"));
    assert!(error_event.field("error").unwrap().contains("op-dup"));
}

#[test]
fn test_log_op_error_with_chained_failure() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_chain_unique_4";

    let err = ExError::failed("move failed")
        .with_source(ExError::new(ExErrorKind::Io).with_message("permission denied"));
    log_op_error!(op_name, err, duration_ms = 3, operation_id = "op-7");

    let error_event = capture
        .events_for_op(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_OPERATION_FAILED"));
    assert_eq!(error_event.field(FIELD_OPERATION_ID), Some("op-7"));
    assert!(error_event
        .field("error")
        .unwrap()
        .contains("permission denied"));
}

#[test]
fn test_single_start_and_end_per_operation() {
    let capture = init_test_capture();
    let op_name = "test_boundary_unique_5";

    log_op_start!(op_name, operation_id = "op-1");
    log_op_end!(op_name, duration_ms = 42);

    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END)
    });

    assert_eq!(starts, 1, "Should have exactly one start event");
    assert_eq!(ends, 1, "Should have exactly one end event");
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_error_event_fields_match_schema_names() {
    let capture = init_test_capture();
    let op_name = "test_schema_field_names_unique_9";

    let err = ExError::new(ExErrorKind::Synchronization).with_message("flush failed");
    log_op_error!(op_name, err, duration_ms = 5, operation_id = "op-9");

    let error_event = capture
        .events_for_op(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(error_event.field(FIELD_ERR_KIND), Some("Synchronization"));
    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_SYNCHRONIZATION"));
    assert_eq!(error_event.field(FIELD_DURATION_MS), Some("5"));
    assert_eq!(error_event.field(FIELD_OPERATION_ID), Some("op-9"));
    assert!(error_event.field(FIELD_COMPONENT).is_some());
}
