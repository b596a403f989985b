//! Error types for scheduler operations and work execution.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Outstanding work did not drain before the deadline.
    #[error("wait timed out with {busy} busy and {queued} queued items")]
    WaitTimeout {
        /// Items still executing when the wait gave up.
        busy: usize,
        /// Items still waiting for admission when the wait gave up.
        queued: usize,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The worker pool has been shut down.
    #[error("worker pool has been shut down")]
    PoolShutdown,
    /// No process-wide scheduler has been installed.
    #[error("no global scheduler installed")]
    NoGlobalScheduler,
}

/// Failure captured from a work item's body.
///
/// Stored on the item and reported to observers on the next tick; never
/// propagated to the worker thread.
#[derive(Debug, Error)]
pub enum WorkError {
    /// The body returned an error.
    #[error("work failed: {0:#}")]
    Failed(#[source] anyhow::Error),
    /// The body panicked.
    #[error("work panicked: {0}")]
    Panicked(String),
    /// The item could not be handed to a worker.
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

impl WorkError {
    /// Build a `Panicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".into());
        Self::Panicked(message)
    }
}

/// Application-facing result using anyhow for work bodies.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_str() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = WorkError::from_panic(payload.as_ref());
        assert_eq!(err.to_string(), "work panicked: boom");
    }

    #[test]
    fn test_panic_payload_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        let err = WorkError::from_panic(payload.as_ref());
        assert_eq!(err.to_string(), "work panicked: kaboom");
    }

    #[test]
    fn test_panic_payload_other() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        let err = WorkError::from_panic(payload.as_ref());
        assert!(matches!(err, WorkError::Panicked(ref m) if m == "non-string panic payload"));
    }
}
