//! Core scheduling abstractions: work items, blocking policy, the ledger of
//! exclusion counters, the worker pool and the tick-driven scheduler.

pub mod error;
pub mod ledger;
pub mod observer;
pub mod policy;
pub mod scheduler;
pub mod work_item;
mod worker_pool;

pub use error::{AppResult, SchedulerError, WorkError};
pub use ledger::BlockingLedger;
pub use observer::{InMemoryEventRecorder, SchedulerEvent, SchedulerObserver, TracingObserver};
pub use policy::{BlockBits, BlockingModes, BlockingPolicy};
pub use scheduler::{EnqueueOutcome, Scheduler, SchedulerStats};
pub use work_item::{
    CompletionCallback, Work, WorkContext, WorkItem, WorkItemBuilder, WorkState, DEFAULT_NAME,
};
