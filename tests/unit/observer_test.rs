//! Tests for the in-memory event recorder

use prometheus_task_director::core::{
    InMemoryEventRecorder, SchedulerEvent, SchedulerObserver, WorkError, WorkItem,
};

#[test]
fn test_recorder_captures_events() {
    let mut recorder = InMemoryEventRecorder::new(10);
    let item = WorkItem::from_fn(|_| Ok(())).name("compile").build();

    recorder.on_log_batch(&["[compile] started".to_string()]);
    recorder.on_exception(&item, &WorkError::Panicked("oops".to_string()));
    recorder.on_input_blocked_changed(true);

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    match &events[1] {
        SchedulerEvent::Exception { task_id, name, error } => {
            assert_eq!(*task_id, item.id());
            assert_eq!(name, "compile");
            assert!(error.contains("oops"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(recorder.exception_count(), 1);
    assert_eq!(recorder.input_edges(), vec![true]);
}

#[test]
fn test_recorder_overflow() {
    let mut recorder = InMemoryEventRecorder::new(2);

    recorder.on_input_blocked_changed(true);
    recorder.on_input_blocked_changed(false);
    recorder.on_input_blocked_changed(true);

    assert_eq!(recorder.input_edges(), vec![false, true]); // First one popped
}

#[test]
fn test_recorder_clones_share_buffer() {
    let recorder = InMemoryEventRecorder::new(8);
    let mut handed_out = recorder.clone();

    handed_out.on_log_batch(&["a".to_string(), "b".to_string()]);
    assert_eq!(recorder.log_lines(), vec!["a".to_string(), "b".to_string()]);

    recorder.clear();
    assert!(handed_out.events().is_empty());
}

#[test]
fn test_event_serialization() {
    let event = SchedulerEvent::InputBlockedChanged { blocked: true };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "input_blocked_changed");
    assert_eq!(json["blocked"], true);
}
