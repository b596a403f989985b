//! Observer implementations.
//!
//! Observers receive everything the scheduler reports from `tick()`: batched
//! log lines, faults captured from work items, and edges of the user-input
//! gate. They are always called on the ticking thread.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::error::WorkError;
use super::work_item::WorkItem;

/// Receiver of scheduler notifications.
///
/// All methods default to no-ops. Implementations must not call
/// `Scheduler::tick` re-entrantly; enqueueing new work and
/// `Scheduler::add_observer` are fine.
pub trait SchedulerObserver: Send {
    /// Log lines accumulated since the previous tick.
    fn on_log_batch(&mut self, _lines: &[String]) {}

    /// A drained item faulted.
    fn on_exception(&mut self, _item: &WorkItem, _error: &WorkError) {}

    /// User input became blocked (`true`) or unblocked (`false`).
    fn on_input_blocked_changed(&mut self, _blocked: bool) {}
}

/// Observer that forwards notifications to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SchedulerObserver for TracingObserver {
    fn on_log_batch(&mut self, lines: &[String]) {
        for line in lines {
            tracing::info!(target: "task_director", "{line}");
        }
    }

    fn on_exception(&mut self, item: &WorkItem, error: &WorkError) {
        tracing::error!(
            target: "task_director",
            task_id = %item.id(),
            name = %item.name(),
            error = %error,
            "work item faulted"
        );
    }

    fn on_input_blocked_changed(&mut self, blocked: bool) {
        tracing::info!(target: "task_director", blocked, "user input gate changed");
    }
}

/// Notification captured by [`InMemoryEventRecorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A batch of log lines.
    LogBatch {
        /// Lines in arrival order.
        lines: Vec<String>,
    },
    /// A faulted item was drained.
    Exception {
        /// Item identifier.
        task_id: Uuid,
        /// Item name.
        name: String,
        /// Rendered error.
        error: String,
    },
    /// The user-input gate flipped.
    InputBlockedChanged {
        /// New gate state.
        blocked: bool,
    },
}

/// In-memory observer with a bounded buffer, for tests and status panels.
///
/// Clones share the same buffer, so a clone can be handed to the scheduler
/// while the original is kept for inspection.
#[derive(Debug, Clone)]
pub struct InMemoryEventRecorder {
    events: Arc<Mutex<VecDeque<SchedulerEvent>>>,
    max_events: usize,
}

impl InMemoryEventRecorder {
    /// Create a recorder keeping at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// All recorded log lines, flattened across batches.
    #[must_use]
    pub fn log_lines(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::LogBatch { lines } => Some(lines.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Recorded input-gate edges, oldest first.
    #[must_use]
    pub fn input_edges(&self) -> Vec<bool> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::InputBlockedChanged { blocked } => Some(*blocked),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded exceptions.
    #[must_use]
    pub fn exception_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SchedulerEvent::Exception { .. }))
            .count()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn record(&self, event: SchedulerEvent) {
        let mut events = self.events.lock();
        if self.max_events == 0 {
            return;
        }
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

impl SchedulerObserver for InMemoryEventRecorder {
    fn on_log_batch(&mut self, lines: &[String]) {
        self.record(SchedulerEvent::LogBatch {
            lines: lines.to_vec(),
        });
    }

    fn on_exception(&mut self, item: &WorkItem, error: &WorkError) {
        self.record(SchedulerEvent::Exception {
            task_id: item.id(),
            name: item.name().to_string(),
            error: error.to_string(),
        });
    }

    fn on_input_blocked_changed(&mut self, blocked: bool) {
        self.record(SchedulerEvent::InputBlockedChanged { blocked });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_overflow() {
        let mut recorder = InMemoryEventRecorder::new(2);
        recorder.on_input_blocked_changed(true);
        recorder.on_input_blocked_changed(false);
        recorder.on_log_batch(&["a".to_string()]);

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SchedulerEvent::InputBlockedChanged { blocked: false });
        assert_eq!(recorder.log_lines(), vec!["a".to_string()]);
    }

    #[test]
    fn test_recorder_clones_share_buffer() {
        let recorder = InMemoryEventRecorder::new(8);
        let mut handle = recorder.clone();
        handle.on_input_blocked_changed(true);
        assert_eq!(recorder.input_edges(), vec![true]);
        recorder.clear();
        assert!(handle.events().is_empty());
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = SchedulerEvent::InputBlockedChanged { blocked: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "input_blocked_changed");
        assert_eq!(json["blocked"], true);
    }
}
