//! Tests for configuration validation

use std::time::Duration;

use prometheus_task_director::config::SchedulerConfig;

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.worker_count >= 1);
    assert_eq!(cfg.poll_interval_ms, 1);
    assert_eq!(cfg.thread_name_prefix, "td-worker");
    assert!(cfg.trace_events);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_worker_count() {
    let invalid = SchedulerConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_poll_interval() {
    let invalid = SchedulerConfig::new().with_poll_interval_ms(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_stack_size() {
    let invalid = SchedulerConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_prefix() {
    let invalid = SchedulerConfig::new().with_thread_name_prefix("");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_poll_interval() {
    let cfg = SchedulerConfig::new().with_poll_interval_ms(25);
    assert_eq!(cfg.poll_interval(), Duration::from_millis(25));
}

#[test]
fn test_scheduler_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{"worker_count": 3, "thread_name_prefix": "editor-bg", "trace_events": false}"#,
    )
    .unwrap();
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.thread_name_prefix, "editor-bg");
    assert!(!cfg.trace_events);
    assert_eq!(cfg.poll_interval_ms, SchedulerConfig::default().poll_interval_ms);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_scheduler_config_json_roundtrip() {
    let cfg = SchedulerConfig::new()
        .with_worker_count(6)
        .with_poll_interval_ms(4);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}
