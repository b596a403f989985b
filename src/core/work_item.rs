//! Units of work and their lifecycle.
//!
//! A [`WorkItem`] bundles a [`Work`] body with an identity, a blocking
//! policy and two completion callbacks. Items are shared as `Arc<WorkItem>`
//! between the caller, the scheduler and the worker that runs them.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_task_director::core::{BlockingModes, WorkItem};
//!
//! let item = WorkItem::from_fn(|ctx| {
//!     ctx.log("compiling shaders");
//!     Ok(())
//! })
//! .name("Build")
//! .blocking_modes(BlockingModes::SAME_NAME)
//! .on_completed_main_thread(|item| println!("{} finished", item.name()))
//! .build();
//!
//! scheduler.enqueue(&item);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{AppResult, SchedulerError, WorkError};
use super::policy::{BlockBits, BlockingModes, BlockingPolicy};
use super::scheduler::{EnqueueOutcome, Scheduler, SchedulerCore};

/// Name given to items built without one.
pub const DEFAULT_NAME: &str = "task";

/// Body of a work item.
///
/// Runs on a worker thread and may block it for its whole duration. An
/// `Err` return or a panic marks the item as faulted; neither reaches the
/// worker thread.
pub trait Work: Send + Sync + 'static {
    /// Perform the work.
    ///
    /// # Errors
    ///
    /// Any error is captured on the item and reported on the next tick.
    fn do_work(&self, ctx: &WorkContext<'_>) -> AppResult<()>;
}

struct FnWork<F>(F);

impl<F> Work for FnWork<F>
where
    F: Fn(&WorkContext<'_>) -> AppResult<()> + Send + Sync + 'static,
{
    fn do_work(&self, ctx: &WorkContext<'_>) -> AppResult<()> {
        (self.0)(ctx)
    }
}

/// Callback invoked with the completed item.
pub type CompletionCallback = Box<dyn Fn(&WorkItem) + Send + Sync>;

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Waiting for admission (or not yet enqueued).
    Queued,
    /// Executing on a worker.
    Running,
    /// Finished, successfully or not.
    Done,
}

impl WorkState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Queued,
            1 => Self::Running,
            _ => Self::Done,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Done => 2,
        }
    }
}

/// Handle given to a running work body.
pub struct WorkContext<'a> {
    item: &'a WorkItem,
    core: &'a SchedulerCore,
}

impl WorkContext<'_> {
    /// Name of the running item.
    #[must_use]
    pub fn name(&self) -> &str {
        self.item.name()
    }

    /// Identifier of the running item.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.item.id()
    }

    /// Queue a log line; it is handed to observers on the next tick.
    pub fn log(&self, line: impl fmt::Display) {
        self.core.push_log(format!("[{}] {line}", self.item.name));
    }
}

/// A unit of work with identity, blocking policy and outcome.
pub struct WorkItem {
    id: Uuid,
    name: String,
    policy: BlockingPolicy,
    enable_logging: bool,
    work: Box<dyn Work>,
    on_completed_off_thread: Option<CompletionCallback>,
    on_completed_main_thread: Option<CompletionCallback>,
    state: AtomicU8,
    faulted: AtomicBool,
    error: Mutex<Option<Arc<WorkError>>>,
    elapsed: Mutex<Option<Duration>>,
}

impl WorkItem {
    /// Start building an item around a [`Work`] implementation.
    pub fn builder(work: impl Work) -> WorkItemBuilder {
        WorkItemBuilder::new(Box::new(work))
    }

    /// Start building an item around a closure.
    pub fn from_fn<F>(f: F) -> WorkItemBuilder
    where
        F: Fn(&WorkContext<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        WorkItemBuilder::new(Box::new(FnWork(f)))
    }

    /// Unique identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Name used for same-name exclusion.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full blocking declaration.
    #[must_use]
    pub const fn policy(&self) -> &BlockingPolicy {
        &self.policy
    }

    /// Modes this item enforces while busy.
    #[must_use]
    pub const fn blocking_modes(&self) -> BlockingModes {
        self.policy.modes
    }

    /// Tags this item carries.
    #[must_use]
    pub const fn own_bits(&self) -> BlockBits {
        self.policy.own_bits
    }

    /// Tags this item excludes while busy.
    #[must_use]
    pub const fn blocking_bits(&self) -> BlockBits {
        self.policy.blocking_bits
    }

    /// Whether verbose per-item logging is enabled.
    #[must_use]
    pub const fn logging_enabled(&self) -> bool {
        self.enable_logging
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkState {
        WorkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true once the item has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state() == WorkState::Done
    }

    /// Returns true if the last run failed.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Error captured from the last run, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<Arc<WorkError>> {
        self.error.lock().clone()
    }

    /// Wall time of the last run.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        *self.elapsed.lock()
    }

    /// Enqueue on the process-wide scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NoGlobalScheduler` if none was installed.
    pub fn enqueue(self: &Arc<Self>) -> Result<EnqueueOutcome, SchedulerError> {
        let scheduler = Scheduler::global().ok_or(SchedulerError::NoGlobalScheduler)?;
        Ok(scheduler.enqueue(self))
    }

    /// Run the item synchronously on the calling thread.
    ///
    /// The item registers itself as busy with `scheduler` (leaving the
    /// waiting queue if it was enqueued) and is reconciled on the next tick
    /// like any dispatched item. A finished item that was already reconciled
    /// runs again.
    ///
    /// Returns false without running the body if the item is already
    /// executing, has been admitted to a worker, or is awaiting
    /// reconciliation.
    pub fn run(self: &Arc<Self>, scheduler: &Scheduler) -> bool {
        let core = scheduler.core();
        if !core.on_running(self) {
            warn!(task_id = %self.id, name = %self.name, "inline run ignored: item is active");
            return false;
        }
        self.execute(core);
        true
    }

    /// Move `Queued` to `Running`. Only one caller wins.
    pub(crate) fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(
                WorkState::Queued.as_u8(),
                WorkState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Run a claimed item. The caller must already have moved it to
    /// `Running` and registered it as busy with `core`.
    pub(crate) fn execute(self: &Arc<Self>, core: &SchedulerCore) {
        debug_assert_eq!(self.state(), WorkState::Running);
        let started = Instant::now();

        let ctx = WorkContext { item: self.as_ref(), core };
        if self.enable_logging {
            ctx.log(format_args!("started ({})", self.id));
        }
        debug!(task_id = %self.id, name = %self.name, "work item started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.work.do_work(&ctx)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(WorkError::Failed(err)),
            Err(payload) => Some(WorkError::from_panic(payload.as_ref())),
        };
        if let Some(err) = failure {
            warn!(task_id = %self.id, name = %self.name, error = %err, "work item faulted");
            if self.enable_logging {
                ctx.log(format_args!("faulted: {err}"));
            }
            *self.error.lock() = Some(Arc::new(err));
            self.faulted.store(true, Ordering::Release);
        }

        self.set_state(WorkState::Done);
        if let Some(callback) = &self.on_completed_off_thread {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(self.as_ref()))).is_err() {
                warn!(task_id = %self.id, name = %self.name, "off-thread completion callback panicked");
            }
        }

        let elapsed = started.elapsed();
        *self.elapsed.lock() = Some(elapsed);
        if self.enable_logging {
            ctx.log(format_args!("finished in {elapsed:?}"));
        }
        debug!(task_id = %self.id, name = %self.name, elapsed_ms = elapsed.as_millis(), "work item finished");

        core.on_done(self);
    }

    /// Invoke the main-thread callback. Only called from `Scheduler::tick`.
    pub(crate) fn complete_on_main_thread(&self) {
        if let Some(callback) = &self.on_completed_main_thread {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(self))).is_err() {
                warn!(task_id = %self.id, name = %self.name, "main-thread completion callback panicked");
            }
        }
    }

    /// Clear the outcome of a previous run before re-enqueueing.
    pub(crate) fn reset(&self) {
        self.set_state(WorkState::Queued);
        self.faulted.store(false, Ordering::Release);
        *self.error.lock() = None;
        *self.elapsed.lock() = None;
    }

    /// Record a failure that happened before the body could run.
    pub(crate) fn fail_before_run(&self, err: WorkError) {
        *self.error.lock() = Some(Arc::new(err));
        self.faulted.store(true, Ordering::Release);
        self.set_state(WorkState::Done);
    }

    fn set_state(&self, state: WorkState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .field("faulted", &self.is_faulted())
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkItem`]. Policy is fixed once `build` is called.
pub struct WorkItemBuilder {
    name: String,
    policy: BlockingPolicy,
    enable_logging: bool,
    work: Box<dyn Work>,
    on_completed_off_thread: Option<CompletionCallback>,
    on_completed_main_thread: Option<CompletionCallback>,
}

impl WorkItemBuilder {
    fn new(work: Box<dyn Work>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            policy: BlockingPolicy::default(),
            enable_logging: false,
            work,
            on_completed_off_thread: None,
            on_completed_main_thread: None,
        }
    }

    /// Set the item name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the modes enforced while busy.
    #[must_use]
    pub fn blocking_modes(mut self, modes: BlockingModes) -> Self {
        self.policy.modes = modes;
        self
    }

    /// Set the tags this item carries.
    #[must_use]
    pub fn own_bits(mut self, bits: BlockBits) -> Self {
        self.policy.own_bits = bits;
        self
    }

    /// Set the tags excluded while busy. Only effective with `BITS`.
    #[must_use]
    pub fn blocking_bits(mut self, bits: BlockBits) -> Self {
        self.policy.blocking_bits = bits;
        self
    }

    /// Enable verbose per-item logging through the scheduler log queue.
    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Callback run on the worker thread right after the body returns.
    ///
    /// Must not touch resources that are not thread-safe.
    #[must_use]
    pub fn on_completed_off_thread(mut self, f: impl Fn(&WorkItem) + Send + Sync + 'static) -> Self {
        self.on_completed_off_thread = Some(Box::new(f));
        self
    }

    /// Callback run from inside the tick that drains this item.
    #[must_use]
    pub fn on_completed_main_thread(mut self, f: impl Fn(&WorkItem) + Send + Sync + 'static) -> Self {
        self.on_completed_main_thread = Some(Box::new(f));
        self
    }

    /// Finish the item.
    #[must_use]
    pub fn build(self) -> Arc<WorkItem> {
        Arc::new(WorkItem {
            id: Uuid::new_v4(),
            name: self.name,
            policy: self.policy,
            enable_logging: self.enable_logging,
            work: self.work,
            on_completed_off_thread: self.on_completed_off_thread,
            on_completed_main_thread: self.on_completed_main_thread,
            state: AtomicU8::new(WorkState::Queued.as_u8()),
            faulted: AtomicBool::new(false),
            error: Mutex::new(None),
            elapsed: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Work for Noop {
        fn do_work(&self, _ctx: &WorkContext<'_>) -> AppResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builder_defaults() {
        let item = WorkItem::builder(Noop).build();
        assert_eq!(item.name(), DEFAULT_NAME);
        assert_eq!(item.blocking_modes(), BlockingModes::NONE);
        assert!(item.own_bits().is_empty());
        assert_eq!(item.state(), WorkState::Queued);
        assert!(!item.is_faulted());
        assert!(item.error().is_none());
        assert!(!item.logging_enabled());
    }

    #[test]
    fn test_builder_policy() {
        let item = WorkItem::from_fn(|_| Ok(()))
            .name("Build")
            .blocking_modes(BlockingModes::SAME_NAME | BlockingModes::BITS)
            .own_bits(BlockBits::bit(1))
            .blocking_bits(BlockBits::bit(3))
            .logging(true)
            .build();
        assert_eq!(item.name(), "Build");
        assert!(item.blocking_modes().contains(BlockingModes::BITS));
        assert!(item.own_bits().is_set(1));
        assert!(item.blocking_bits().is_set(3));
        assert!(item.logging_enabled());
    }

    #[test]
    fn test_distinct_ids() {
        let a = WorkItem::builder(Noop).build();
        let b = WorkItem::builder(Noop).build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_reset_clears_outcome() {
        let item = WorkItem::builder(Noop).build();
        item.fail_before_run(WorkError::Dispatch("closed".into()));
        assert!(item.is_done());
        assert!(item.is_faulted());

        item.reset();
        assert_eq!(item.state(), WorkState::Queued);
        assert!(!item.is_faulted());
        assert!(item.error().is_none());
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [WorkState::Queued, WorkState::Running, WorkState::Done] {
            assert_eq!(WorkState::from_u8(state.as_u8()), state);
        }
    }
}
