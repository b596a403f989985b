//! Tests for builder modules

use prometheus_task_director::builders::{build_scheduler, SchedulerBuilder};
use prometheus_task_director::config::SchedulerConfig;
use prometheus_task_director::core::{
    InMemoryEventRecorder, SchedulerError, SchedulerObserver, WorkItem,
};

fn small_config() -> SchedulerConfig {
    SchedulerConfig::new()
        .with_worker_count(2)
        .with_trace_events(false)
        .with_thread_name_prefix("builder-test")
}

#[test]
fn test_builder_spawns_configured_workers() {
    let scheduler = SchedulerBuilder::new(small_config()).build().unwrap();
    assert_eq!(scheduler.stats().worker_count, 2);
    assert_eq!(scheduler.config().thread_name_prefix, "builder-test");
    scheduler.shutdown();
    assert!(scheduler.is_shut_down());
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = SchedulerBuilder::new(small_config().with_worker_count(0)).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_build_scheduler_registers_observers() {
    let recorder = InMemoryEventRecorder::new(16);
    let observers: Vec<Box<dyn SchedulerObserver>> = vec![Box::new(recorder.clone())];
    let scheduler = build_scheduler(&small_config(), observers).unwrap();

    let item = WorkItem::from_fn(|ctx| {
        ctx.log("ping");
        Ok(())
    })
    .name("heartbeat")
    .build();
    scheduler.enqueue(&item);
    scheduler.wait();

    assert_eq!(recorder.log_lines(), vec!["[heartbeat] ping".to_string()]);
}

#[test]
fn test_dispatch_after_shutdown_faults_item() {
    let recorder = InMemoryEventRecorder::new(16);
    let scheduler = SchedulerBuilder::new(small_config())
        .with_observer(recorder.clone())
        .build()
        .unwrap();
    scheduler.shutdown();

    let item = WorkItem::from_fn(|_| Ok(())).build();
    scheduler.enqueue(&item);
    scheduler.wait();

    assert!(item.is_done());
    assert!(item.is_faulted());
    assert_eq!(recorder.exception_count(), 1);
}
