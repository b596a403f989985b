//! Tick-driven scheduler with policy-based mutual exclusion.
//!
//! Work flows through three collections, and every item sits in exactly one
//! of them while the scheduler tracks it:
//!
//! ```text
//!  enqueue ──► waiting ──tick/admit──► busy ──on_done──► done_pending ──tick──► (released)
//!                                   (worker runs do_work)             (main-thread callback)
//! ```
//!
//! `tick()` must always be called from the same thread (the "main" thread).
//! It is the only place where main-thread callbacks and observers run, so
//! they never race with the worker pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_task_director::config::SchedulerConfig;
//! use prometheus_task_director::core::{BlockingModes, Scheduler, WorkItem};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(4))?;
//!
//! let item = WorkItem::from_fn(|_| Ok(()))
//!     .name("Build")
//!     .blocking_modes(BlockingModes::SAME_NAME)
//!     .build();
//! scheduler.enqueue(&item);
//!
//! // Called by the host's frame loop or timer, always on the same thread.
//! scheduler.tick();
//!
//! // Or block until everything queued so far has been reconciled.
//! scheduler.wait();
//! ```

use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;

use super::error::{SchedulerError, WorkError};
use super::ledger::BlockingLedger;
use super::observer::SchedulerObserver;
use super::work_item::{WorkItem, WorkState};
use super::worker_pool::WorkerPool;

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// Result of [`Scheduler::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// Appended to the waiting queue.
    Queued,
    /// Already waiting; nothing changed.
    AlreadyQueued,
    /// Running or awaiting reconciliation; nothing changed.
    AlreadyActive,
}

/// Point-in-time scheduler diagnostics. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Items waiting for admission.
    pub queued: usize,
    /// Items executing.
    pub busy: usize,
    /// Items finished but not yet reconciled by a tick.
    pub done_pending: usize,
    /// Busy items declaring `ALL`.
    pub block_all: usize,
    /// Busy items declaring `USER_INTERACTION`.
    pub block_input: usize,
    /// Distinct names currently blocked.
    pub blocked_names: usize,
    /// Total successful enqueues.
    pub enqueued_total: u64,
    /// Total items admitted to the worker pool.
    pub dispatched_total: u64,
    /// Total items that reached `Done`.
    pub completed_total: u64,
    /// Total items that faulted.
    pub faulted_total: u64,
}

#[derive(Default)]
struct Totals {
    enqueued: u64,
    dispatched: u64,
    completed: u64,
    faulted: u64,
}

#[derive(Default)]
struct DirectorState {
    waiting: VecDeque<Arc<WorkItem>>,
    busy: HashMap<Uuid, Arc<WorkItem>>,
    done_pending: Vec<Arc<WorkItem>>,
    /// Batch taken from `done_pending` whose callbacks are running.
    draining: Vec<Arc<WorkItem>>,
    /// Items from `draining` enqueued again; queued once the drain ends.
    deferred: Vec<Arc<WorkItem>>,
    ledger: BlockingLedger,
    /// Last input-gate state reported to observers.
    input_blocked: bool,
    totals: Totals,
}

impl DirectorState {
    fn is_idle(&self) -> bool {
        self.waiting.is_empty()
            && self.busy.is_empty()
            && self.done_pending.is_empty()
            && self.deferred.is_empty()
    }

    /// Busy, or finished and not yet fully reconciled.
    fn is_tracked(&self, item: &Arc<WorkItem>) -> bool {
        let same = |other: &Arc<WorkItem>| Arc::ptr_eq(other, item);
        self.busy.contains_key(&item.id())
            || self.done_pending.iter().any(same)
            || self.draining.iter().any(same)
            || self.deferred.iter().any(same)
    }
}

/// State shared between the scheduler and its worker threads.
pub(crate) struct SchedulerCore {
    state: Mutex<DirectorState>,
    logs: Mutex<Vec<String>>,
}

impl SchedulerCore {
    fn new() -> Self {
        Self {
            state: Mutex::new(DirectorState::default()),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_log(&self, line: String) {
        self.logs.lock().push(line);
    }

    fn drain_logs(&self) -> Vec<String> {
        mem::take(&mut *self.logs.lock())
    }

    /// Claim `item` for an inline run: `Queued` to `Running`, out of the
    /// waiting queue, into busy with its ledger contributions added.
    ///
    /// Returns false if the item is running, admitted to a worker, or not
    /// yet reconciled. A reconciled `Done` item is reset first. Admitted
    /// items are claimed by `admit` instead.
    pub(crate) fn on_running(&self, item: &Arc<WorkItem>) -> bool {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if item.is_done() {
            if st.is_tracked(item) {
                return false;
            }
            item.reset();
        }
        if !item.try_claim() {
            return false;
        }
        // Run inline while still enqueued: leave the waiting queue.
        st.waiting.retain(|w| !Arc::ptr_eq(w, item));
        st.ledger.acquire(item.name(), item.policy());
        st.busy.insert(item.id(), Arc::clone(item));
        trace!(task_id = %item.id(), "item claimed for inline run");
        true
    }

    /// Release `item`'s contributions and queue it for reconciliation.
    pub(crate) fn on_done(&self, item: &Arc<WorkItem>) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.busy.remove(&item.id()).is_some() {
            st.ledger.release(item.name(), item.policy());
        } else {
            debug_assert!(false, "item {} finished without being busy", item.id());
            error!(task_id = %item.id(), "item finished without being busy");
        }
        st.done_pending.push(Arc::clone(item));
        st.totals.completed += 1;
        if item.is_faulted() {
            st.totals.faulted += 1;
        }
    }

    /// Move every admissible waiting item to busy, in queue order.
    fn admit(&self) -> Vec<Arc<WorkItem>> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.waiting.is_empty() || st.ledger.block_all_count() > 0 {
            return Vec::new();
        }

        let mut admitted = Vec::new();
        let mut still_waiting = VecDeque::with_capacity(st.waiting.len());
        for item in st.waiting.drain(..) {
            // An admitted ALL item closes the barrier for the rest of the scan.
            let open = st.ledger.block_all_count() == 0;
            if open && st.ledger.admits(item.name(), item.own_bits()) {
                if !item.try_claim() {
                    error!(task_id = %item.id(), state = ?item.state(), "waiting item is not queued");
                    still_waiting.push_back(item);
                    continue;
                }
                st.ledger.acquire(item.name(), item.policy());
                st.busy.insert(item.id(), Arc::clone(&item));
                st.totals.dispatched += 1;
                admitted.push(item);
            } else {
                still_waiting.push_back(item);
            }
        }
        st.waiting = still_waiting;
        admitted
    }
}

/// Cooperative scheduler owning the queues, the blocking ledger and the
/// worker pool.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    pool: WorkerPool,
    observers: Mutex<Vec<Box<dyn SchedulerObserver>>>,
    /// Registered but not yet notified; merged at the next notification.
    pending_observers: Mutex<Vec<Box<dyn SchedulerObserver>>>,
    config: SchedulerConfig,
    tick_thread: OnceLock<ThreadId>,
}

impl Scheduler {
    /// Create a scheduler and spawn its worker threads.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` for an invalid configuration
    /// and `SchedulerError::Spawn` if a worker thread cannot be started.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).build()
    }

    /// Start building a scheduler.
    #[must_use]
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: SchedulerConfig,
        observers: Vec<Box<dyn SchedulerObserver>>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let core = Arc::new(SchedulerCore::new());
        let pool = WorkerPool::new(&config, &core)?;
        Ok(Self {
            core,
            pool,
            observers: Mutex::new(observers),
            pending_observers: Mutex::new(Vec::new()),
            config,
            tick_thread: OnceLock::new(),
        })
    }

    /// Install `scheduler` as the process-wide instance used by
    /// [`WorkItem::enqueue`].
    ///
    /// # Errors
    ///
    /// Returns the scheduler back if one is already installed.
    pub fn install_global(scheduler: Self) -> Result<(), Self> {
        GLOBAL.set(scheduler)
    }

    /// The process-wide scheduler, if installed.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get()
    }

    pub(crate) fn core(&self) -> &SchedulerCore {
        &self.core
    }

    /// Configuration this scheduler was built with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register an additional observer.
    ///
    /// It receives notifications from the next one on. May be called from
    /// inside an observer callback.
    pub fn add_observer(&self, observer: impl SchedulerObserver + 'static) {
        self.pending_observers.lock().push(Box::new(observer));
    }

    /// Append `item` to the waiting queue.
    ///
    /// No-op if the item is already waiting (same `Arc`), running, or
    /// finished but not yet reconciled. A reconciled item is reset and
    /// queued again. An item re-enqueued from a completion callback of the
    /// tick that is reconciling it is queued once that drain finishes.
    /// Safe to call from any thread.
    pub fn enqueue(&self, item: &Arc<WorkItem>) -> EnqueueOutcome {
        let mut guard = self.core.state.lock();
        let st = &mut *guard;

        let active = item.state() == WorkState::Running
            || st.busy.contains_key(&item.id())
            || st.done_pending.iter().any(|d| Arc::ptr_eq(d, item));
        if active {
            warn!(task_id = %item.id(), name = %item.name(), "enqueue ignored: item is active");
            return EnqueueOutcome::AlreadyActive;
        }
        if st.waiting.iter().any(|w| Arc::ptr_eq(w, item))
            || st.deferred.iter().any(|d| Arc::ptr_eq(d, item))
        {
            debug!(task_id = %item.id(), "enqueue ignored: item already queued");
            return EnqueueOutcome::AlreadyQueued;
        }
        if st.draining.iter().any(|d| Arc::ptr_eq(d, item)) {
            // Its exception and main-thread callback still have to see
            // this run's outcome.
            st.deferred.push(Arc::clone(item));
            st.totals.enqueued += 1;
            debug!(task_id = %item.id(), name = %item.name(), "enqueue deferred until drain ends");
            return EnqueueOutcome::Queued;
        }

        if item.is_done() {
            item.reset();
        }
        st.waiting.push_back(Arc::clone(item));
        st.totals.enqueued += 1;
        debug!(task_id = %item.id(), name = %item.name(), "item enqueued");
        EnqueueOutcome::Queued
    }

    /// Reconcile completions and admit new work.
    ///
    /// In order: drain finished items (exception notifications, then
    /// main-thread callbacks), admit waiting items the ledger allows and
    /// dispatch them, flush the log queue to observers, and report an
    /// input-gate edge if one occurred.
    pub fn tick(&self) {
        self.check_tick_thread();

        let done = {
            let mut st = self.core.state.lock();
            let done = mem::take(&mut st.done_pending);
            st.draining.clone_from(&done);
            done
        };
        for item in &done {
            if let Some(err) = item.error() {
                self.notify(|o| o.on_exception(item.as_ref(), err.as_ref()));
            }
            item.complete_on_main_thread();
        }
        {
            let mut guard = self.core.state.lock();
            let st = &mut *guard;
            st.draining.clear();
            for item in st.deferred.drain(..) {
                item.reset();
                st.waiting.push_back(item);
            }
        }

        for item in self.core.admit() {
            debug!(task_id = %item.id(), name = %item.name(), "item admitted");
            if let Err(e) = self.pool.dispatch(Arc::clone(&item)) {
                error!(task_id = %item.id(), error = %e, "dispatch failed");
                item.fail_before_run(WorkError::Dispatch(e.to_string()));
                self.core.on_done(&item);
            }
        }

        let lines = self.core.drain_logs();
        if !lines.is_empty() {
            self.notify(|o| o.on_log_batch(&lines));
        }

        let edge = {
            let mut st = self.core.state.lock();
            let blocked = st.ledger.block_input_count() > 0;
            if blocked == st.input_blocked {
                None
            } else {
                st.input_blocked = blocked;
                Some(blocked)
            }
        };
        if let Some(blocked) = edge {
            self.notify(|o| o.on_input_blocked_changed(blocked));
        }
    }

    /// Tick until nothing is waiting, busy or awaiting reconciliation.
    ///
    /// Must be called on the ticking thread. Work enqueued by callbacks
    /// while waiting is waited for as well.
    pub fn wait(&self) {
        let poll = self.config.poll_interval();
        loop {
            self.tick();
            if self.is_idle() {
                return;
            }
            thread::sleep(poll);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::WaitTimeout` if work is still outstanding.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), SchedulerError> {
        let poll = self.config.poll_interval();
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.is_idle() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SchedulerError::WaitTimeout {
                    busy: self.busy_count(),
                    queued: self.queue_count(),
                });
            }
            thread::sleep(poll);
        }
    }

    /// Async [`wait`](Self::wait), yielding to the runtime between polls.
    ///
    /// Poll it on the ticking thread, e.g. from a current-thread runtime.
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_async(&self) {
        let poll = self.config.poll_interval();
        loop {
            self.tick();
            if self.is_idle() {
                return;
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Returns true if some busy item blocks bit `index`.
    #[must_use]
    pub fn is_blocking_bit(&self, index: usize) -> bool {
        self.core.state.lock().ledger.bit_count(index) > 0
    }

    /// Returns true while a busy item gates user input.
    #[must_use]
    pub fn is_input_blocked(&self) -> bool {
        self.core.state.lock().ledger.block_input_count() > 0
    }

    /// Number of executing items. Advisory only.
    #[must_use]
    pub fn busy_count(&self) -> usize {
        self.core.state.lock().busy.len()
    }

    /// Number of items waiting for admission. Advisory only.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.core.state.lock().waiting.len()
    }

    /// Returns true if anything is waiting or executing. Advisory only.
    #[must_use]
    pub fn has_tasks(&self) -> bool {
        let st = self.core.state.lock();
        !st.waiting.is_empty() || !st.busy.is_empty()
    }

    /// Snapshot of queue sizes, blocking counters and lifetime totals.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let st = self.core.state.lock();
        SchedulerStats {
            worker_count: self.pool.worker_count(),
            queued: st.waiting.len(),
            busy: st.busy.len(),
            done_pending: st.done_pending.len(),
            block_all: st.ledger.block_all_count(),
            block_input: st.ledger.block_input_count(),
            blocked_names: st.ledger.blocked_name_count(),
            enqueued_total: st.totals.enqueued,
            dispatched_total: st.totals.dispatched,
            completed_total: st.totals.completed,
            faulted_total: st.totals.faulted,
        }
    }

    /// Stop the worker pool. Already dispatched items still run; later
    /// dispatches fault with `SchedulerError::PoolShutdown`.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.pool.is_shut_down()
    }

    fn is_idle(&self) -> bool {
        self.core.state.lock().is_idle()
    }

    fn notify(&self, mut f: impl FnMut(&mut dyn SchedulerObserver)) {
        let mut observers = self.observers.lock();
        // Staged separately so observers can register more observers.
        let pending = mem::take(&mut *self.pending_observers.lock());
        observers.extend(pending);
        for observer in observers.iter_mut() {
            f(observer.as_mut());
        }
    }

    fn check_tick_thread(&self) {
        let current = thread::current().id();
        let owner = *self.tick_thread.get_or_init(|| current);
        if owner != current {
            warn!(?owner, ?current, "tick called from a different thread");
            debug_assert_eq!(owner, current, "tick must always run on the same thread");
        }
    }
}
