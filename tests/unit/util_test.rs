//! Tests for utility functions

use prometheus_task_director::util::{init_tracing, init_tracing_with_default};

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing_with_default("debug");
    assert!(tracing::dispatcher::has_been_set());

    // A subscriber is already installed; later calls leave it alone.
    assert!(!init_tracing_with_default("warn"));
    init_tracing();
}
