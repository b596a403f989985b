//! Tests for error types

use std::error::Error as _;

use prometheus_task_director::core::{SchedulerError, WorkError};

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("worker_count must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_wait_timeout_error() {
    let err = SchedulerError::WaitTimeout { busy: 2, queued: 5 };
    let msg = err.to_string();
    assert!(msg.contains('2'));
    assert!(msg.contains('5'));
}

#[test]
fn test_spawn_error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
    let err: SchedulerError = io.into();
    assert!(matches!(err, SchedulerError::Spawn(_)));
    assert!(err.source().is_some());
}

#[test]
fn test_work_failed_keeps_context_chain() {
    let inner = anyhow::anyhow!("file missing").context("loading project");
    let err = WorkError::Failed(inner);
    let msg = err.to_string();
    assert!(msg.contains("loading project"));
    assert!(msg.contains("file missing"));
}

#[test]
fn test_dispatch_error() {
    let err = WorkError::Dispatch("worker pool is shut down".to_string());
    assert!(err.to_string().contains("worker pool is shut down"));
}
