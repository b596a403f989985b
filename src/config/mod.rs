//! Configuration models for the scheduler and its worker pool.

pub mod scheduler;

pub use scheduler::{
    SchedulerConfig, ENV_POLL_INTERVAL_MS, ENV_THREAD_STACK_SIZE, ENV_WORKER_COUNT,
};
