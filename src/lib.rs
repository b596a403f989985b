//! # Prometheus Task Director
//!
//! A cooperative task scheduler with policy-based mutual exclusion.
//!
//! Short-lived work items run on a pool of dedicated worker threads, while a
//! single "main" thread drives the scheduler with periodic `tick()` calls.
//! Everything that is not thread-safe (completion callbacks, observers,
//! admission decisions) happens inside `tick()`.
//!
//! ## Blocking Policies
//!
//! While an item is busy it can hold back other items:
//!
//! - **`ALL`**: a global barrier, nothing new is admitted
//! - **`SAME_NAME`**: items sharing its name wait
//! - **`BITS`**: items tagged with one of its blocking bits wait
//! - **`USER_INTERACTION`**: observers are told to gate user input
//!
//! ## Two-Phase Completion
//!
//! 1. `on_completed_off_thread` runs on the worker right after the body
//! 2. `on_completed_main_thread` runs on the next `tick()`
//!
//! Errors and panics in a body are captured on the item and reported to
//! observers from `tick()`; they never unwind a worker.
//!
//! ```rust,ignore
//! use prometheus_task_director::config::SchedulerConfig;
//! use prometheus_task_director::core::{BlockingModes, Scheduler, WorkItem};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::from_env()?)?;
//!
//! let build = WorkItem::from_fn(|ctx| {
//!     ctx.log("building");
//!     Ok(())
//! })
//! .name("Build")
//! .blocking_modes(BlockingModes::SAME_NAME)
//! .on_completed_main_thread(|item| println!("{} done", item.name()))
//! .build();
//!
//! scheduler.enqueue(&build);
//! scheduler.wait();
//! ```
//!
//! For complete examples, see `tests/scheduler_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and blocking-policy accounting.
pub mod core;
/// Configuration models for the scheduler and worker pool.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;

pub use crate::config::SchedulerConfig;
pub use crate::core::{
    BlockBits, BlockingModes, EnqueueOutcome, Scheduler, SchedulerError, SchedulerObserver,
    WorkError, WorkItem,
};
