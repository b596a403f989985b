//! Worker pool with dedicated OS threads.
//!
//! Workers block on an unbounded channel and run whatever the scheduler
//! admits. The pool never decides *what* runs; admission happens in
//! `Scheduler::tick`.
//!
//! - **No polling**: workers sleep in `recv` until an item arrives
//! - **Clean shutdown**: dropping the sender drains the channel, then
//!   unblocks every worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;

use super::error::SchedulerError;
use super::scheduler::SchedulerCore;
use super::work_item::WorkItem;

/// How long `shutdown` waits for each worker before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct WorkerPool {
    /// Option allows clean shutdown by dropping.
    job_tx: Mutex<Option<Sender<Arc<WorkItem>>>>,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `config.worker_count` named worker threads.
    pub(crate) fn new(
        config: &SchedulerConfig,
        core: &Arc<SchedulerCore>,
    ) -> Result<Self, SchedulerError> {
        let (job_tx, job_rx) = unbounded::<Arc<WorkItem>>();

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                format!("{}-{worker_id}", config.thread_name_prefix),
                worker_id,
                job_rx.clone(),
                Arc::clone(core),
                config.thread_stack_size,
            )?;
            workers.push(worker);
        }

        info!(
            worker_count = config.worker_count,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            job_tx: Mutex::new(Some(job_tx)),
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
            worker_count: config.worker_count,
        })
    }

    pub(crate) const fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Hand an admitted item to the workers (fire-and-forget).
    pub(crate) fn dispatch(&self, item: Arc<WorkItem>) -> Result<(), SchedulerError> {
        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            return Err(SchedulerError::PoolShutdown);
        };
        job_tx.send(item).map_err(|_| SchedulerError::PoolShutdown)
    }

    /// Stop accepting items and join workers, detaching any that do not
    /// exit within `JOIN_TIMEOUT`.
    ///
    /// Items already dispatched are still run before the workers exit.
    pub(crate) fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down worker pool");
        *self.job_tx.lock() = None;

        let mut workers = self.workers.lock();
        let worker_count = workers.len();

        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = crossbeam_channel::bounded(1);
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(true) => debug!(worker_id = idx, "Worker joined successfully"),
                Ok(false) => warn!(worker_id = idx, "Worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }

        info!(worker_count = worker_count, "Worker pool shut down complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal only; explicit shutdown() is required to join workers.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            *self.job_tx.lock() = None;
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

fn spawn_worker(
    thread_name: String,
    worker_id: usize,
    job_rx: Receiver<Arc<WorkItem>>,
    core: Arc<SchedulerCore>,
    stack_size: usize,
) -> Result<JoinHandle<()>, SchedulerError> {
    let handle = thread::Builder::new()
        .name(thread_name)
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            // recv() keeps yielding queued items after the sender is dropped
            // and only errors once the channel is empty.
            while let Ok(item) = job_rx.recv() {
                debug!(worker_id = worker_id, task_id = %item.id(), "Worker executing item");
                item.execute(&core);
            }

            debug!(worker_id = worker_id, "Worker thread exiting");
        })?;
    Ok(handle)
}
