//! Fixed-size worker thread pool.
//!
//! # Scheduling
//!
//! All workers consume one shared FIFO queue; there is no work stealing.
//! Tasks start in submission order (with several workers they may of course
//! *finish* in any order).
//!
//! # Lifecycle
//!
//! ```text
//! Running --shutdown()--> Draining --last worker exits--> Stopped
//! ```
//!
//! `submit` only succeeds while Running. On shutdown the queued tasks are
//! either run ([`ShutdownPolicy::Drain`]) or dropped unrun
//! ([`ShutdownPolicy::Discard`]). `shutdown(true)` blocks until Stopped.
//!
//! # Failures
//!
//! A task that panics or returns `Err` is caught at the pool boundary and
//! reported to the configured [`ErrorSink`]. The worker keeps running.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use niggly::pool::{PoolState, ThreadPool};
//!
//! let pool = ThreadPool::new(2).expect("spawn workers");
//! let done = Arc::new(AtomicUsize::new(0));
//! for _ in 0..10 {
//!     let done = Arc::clone(&done);
//!     pool.submit(move || {
//!         done.fetch_add(1, Ordering::Relaxed);
//!     })
//!     .expect("pool is running");
//! }
//! pool.shutdown(true).expect("called from outside the pool");
//! assert_eq!(done.load(Ordering::Relaxed), 10);
//! assert_eq!(pool.current_state(), PoolState::Stopped);
//! ```

mod config;
mod queue;
mod sink;
mod worker;

pub use config::{PoolBuilder, PoolConfig, ShutdownPolicy, ThreadCallback};
pub use sink::{
    CollectorSink, ErrorSink, FnSink, LogSink, TaskError, TaskFailure, TaskFailureKind,
};

use parking_lot::{Condvar, Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crate::error::{Error, ErrorKind};
use crate::sync::Backoff;
use crate::tracing_compat::{debug, error, trace, warn};
use queue::{Task, TaskQueue};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a [`ThreadPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PoolState {
    /// Accepting and running tasks.
    Running = 0,
    /// Shutdown has begun; queued tasks are being drained or discarded.
    Draining = 1,
    /// Every worker has exited.
    Stopped = 2,
}

impl PoolState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Error returned when a task cannot be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The pool is draining or stopped.
    #[error("thread pool is closed")]
    Closed,
    /// The bounded queue is full (only from `try_submit`).
    #[error("thread pool queue is full")]
    Full,
}

/// Error returned by [`ThreadPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    /// `shutdown(true)` was called from one of the pool's own workers,
    /// which would wait for itself. Shutdown has still begun.
    #[error("cannot wait for pool shutdown from one of its own workers")]
    FromWorker,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Tasks accepted by `submit`/`try_submit`.
    pub submitted: u64,
    /// Tasks that ran to completion without error.
    pub completed: u64,
    /// Tasks that panicked or returned an error.
    pub failed: u64,
    /// Tasks dropped unrun under [`ShutdownPolicy::Discard`].
    pub discarded: u64,
    /// Tasks run inline through [`ThreadPool::run_pending_task`].
    pub inline_runs: u64,
    /// Tasks waiting in the queue.
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
    inline_runs: AtomicU64,
}

/// State shared between the pool handle and its workers.
struct Shared {
    id: u64,
    state: AtomicU8,
    queue: TaskQueue,
    /// Submitters hold it shared while pushing; shutdown takes it exclusively
    /// once to wait out in-flight pushes before closing the queue.
    admission: RwLock<()>,
    shutdown_policy: ShutdownPolicy,
    error_sink: Arc<dyn ErrorSink>,
    on_thread_start: Option<ThreadCallback>,
    on_thread_stop: Option<ThreadCallback>,
    counters: Counters,
    live_workers: AtomicUsize,
    stopped_lock: Mutex<()>,
    stopped: Condvar,
}

impl Shared {
    fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn submit_task(&self, task: Task, blocking: bool) -> Result<(), SubmitError> {
        if blocking && self.queue.capacity().is_some() && self.current_worker().is_some() {
            return self.submit_from_worker(task);
        }
        let _admission = self.admission.read();
        if self.state() != PoolState::Running {
            return Err(SubmitError::Closed);
        }
        if blocking {
            self.queue.push(task)?;
        } else {
            self.queue.try_push(task).map_err(|(_, reason)| reason)?;
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Blocking submit from one of this pool's own workers.
    ///
    /// Waiting on a full queue there can stall the pool, so queued tasks run
    /// inline between attempts. The admission gate is never held while a
    /// task runs.
    fn submit_from_worker(&self, mut task: Task) -> Result<(), SubmitError> {
        let mut backoff = Backoff::new();
        loop {
            {
                let _admission = self.admission.read();
                if self.state() != PoolState::Running {
                    return Err(SubmitError::Closed);
                }
                match self.queue.try_push(task) {
                    Ok(()) => {
                        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                        return Ok(());
                    }
                    Err((_, SubmitError::Closed)) => return Err(SubmitError::Closed),
                    Err((rejected, SubmitError::Full)) => task = rejected,
                }
            }
            if self.run_inline() {
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    /// Index of the calling thread if it is one of this pool's workers.
    fn current_worker(&self) -> Option<usize> {
        worker::current()
            .filter(|ctx| ctx.pool_id == self.id)
            .map(|ctx| ctx.index)
    }

    /// Pops one queued task and runs it on the calling thread.
    ///
    /// Returns false when the queue is empty or the thread already nests
    /// [`MAX_INLINE_DEPTH`](worker::MAX_INLINE_DEPTH) inline runs.
    fn run_inline(&self) -> bool {
        let Some(_depth) = worker::InlineScope::enter() else {
            return false;
        };
        let Some(task) = self.queue.pop() else {
            return false;
        };
        let worker = self.current_worker();
        trace!(pool = self.id, worker = ?worker, depth = worker::inline_depth(), "running task inline");
        if self.dispatch(task, worker) {
            self.counters.inline_runs.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Runs or discards a dequeued task. Returns true if it ran.
    fn dispatch(&self, task: Task, worker: Option<usize>) -> bool {
        if self.shutdown_policy == ShutdownPolicy::Discard && self.state() != PoolState::Running {
            drop(task);
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.execute(task, worker);
        true
    }

    fn execute(&self, task: Task, worker: Option<usize>) {
        let kind = match catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(Err(err)) => TaskFailureKind::Failed(Arc::from(err)),
            Err(payload) => TaskFailureKind::Panicked(panic_message(payload.as_ref())),
        };
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let failure = TaskFailure { worker, kind };
        if catch_unwind(AssertUnwindSafe(|| self.error_sink.report(failure))).is_err() {
            error!(pool = self.id, "error sink panicked while reporting a task failure");
        }
    }

    /// Moves Running -> Draining and closes the queue. Idempotent.
    fn begin_shutdown(&self) {
        if self
            .state
            .compare_exchange(
                PoolState::Running as u8,
                PoolState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }
        debug!(pool = self.id, policy = ?self.shutdown_policy, "pool draining");
        self.queue.close_slots();
        drop(self.admission.write());
        self.queue.close();
        self.mark_stopped_if_idle();
    }

    fn worker_exited(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
        self.mark_stopped_if_idle();
    }

    fn mark_stopped_if_idle(&self) {
        let _guard = self.stopped_lock.lock();
        if self.live_workers.load(Ordering::Acquire) != 0 || !self.queue.is_closed() {
            return;
        }
        if self.state.swap(PoolState::Stopped as u8, Ordering::AcqRel) == PoolState::Stopped as u8 {
            return;
        }
        let discarded = self.counters.discarded.load(Ordering::Relaxed);
        if discarded > 0 {
            warn!(pool = self.id, discarded, "queued tasks discarded at shutdown");
        }
        debug!(pool = self.id, "pool stopped");
        self.stopped.notify_all();
    }

    fn wait_stopped(&self) {
        let mut guard = self.stopped_lock.lock();
        while self.state() != PoolState::Stopped {
            self.stopped.wait(&mut guard);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A fixed set of worker threads consuming a shared FIFO task queue.
///
/// Dropping the pool shuts it down and waits for the workers, unless the
/// drop happens on one of its own workers, in which case it only begins
/// shutdown.
pub struct ThreadPool {
    shared: Arc<Shared>,
    worker_count: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Spawns a pool with `workers` threads and default settings.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Spawn`] error if a thread cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, Error> {
        PoolBuilder::new().worker_threads(workers).build()
    }

    /// Returns a builder with default settings.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Spawns a pool from `config` (normalized first).
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Spawn`] error if a thread cannot be spawned.
    /// Workers spawned before the failure are shut down and joined.
    pub fn with_config(mut config: PoolConfig) -> Result<Self, Error> {
        config.normalize();
        let shared = Arc::new(Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            state: AtomicU8::new(PoolState::Running as u8),
            queue: TaskQueue::new(config.queue_capacity),
            admission: RwLock::new(()),
            shutdown_policy: config.shutdown_policy,
            error_sink: config.error_sink,
            on_thread_start: config.on_thread_start,
            on_thread_stop: config.on_thread_stop,
            counters: Counters::default(),
            live_workers: AtomicUsize::new(0),
            stopped_lock: Mutex::new(()),
            stopped: Condvar::new(),
        });
        let pool = Self {
            shared,
            worker_count: config.worker_threads,
            handles: Mutex::new(Vec::with_capacity(config.worker_threads)),
        };

        for index in 0..config.worker_threads {
            let mut builder =
                std::thread::Builder::new().name(format!("{}-{index}", config.thread_name_prefix));
            if let Some(stack_size) = config.thread_stack_size {
                builder = builder.stack_size(stack_size);
            }
            pool.shared.live_workers.fetch_add(1, Ordering::AcqRel);
            let shared = Arc::clone(&pool.shared);
            match builder.spawn(move || worker::run(shared, index)) {
                Ok(handle) => pool.handles.lock().push(handle),
                Err(err) => {
                    pool.shared.live_workers.fetch_sub(1, Ordering::AcqRel);
                    error!(pool = pool.shared.id, worker = index, %err, "failed to spawn worker");
                    // Dropping `pool` shuts down and joins the spawned workers.
                    return Err(Error::new(ErrorKind::Spawn)
                        .with_message(format!("spawning worker {index}"))
                        .with_source(err));
                }
            }
        }
        debug!(
            pool = pool.shared.id,
            workers = pool.worker_count,
            capacity = ?pool.shared.queue.capacity(),
            "pool started"
        );
        Ok(pool)
    }

    /// Queues an infallible task.
    ///
    /// Blocks while a bounded queue is full. Called on one of this pool's
    /// workers, it runs queued tasks inline until there is room.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Closed`] once shutdown has begun, including for a
    /// submitter that was blocked on a full queue.
    pub fn submit<F>(&self, f: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit_task(
            Box::new(move || {
                f();
                Ok(())
            }),
            true,
        )
    }

    /// Queues a task whose `Err` is reported to the error sink.
    ///
    /// # Errors
    ///
    /// As for [`submit`](Self::submit).
    pub fn submit_fallible<F, E>(&self, f: F) -> Result<(), SubmitError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<TaskError>,
    {
        self.shared
            .submit_task(Box::new(move || f().map_err(Into::into)), true)
    }

    /// Queues a task without waiting for room.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Full`] if a bounded queue has no room,
    /// [`SubmitError::Closed`] once shutdown has begun.
    pub fn try_submit<F>(&self, f: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit_task(
            Box::new(move || {
                f();
                Ok(())
            }),
            false,
        )
    }

    /// Pops the oldest queued task and runs it on the calling thread.
    ///
    /// Returns true if a task was taken from the queue. Under
    /// [`ShutdownPolicy::Discard`] a task taken after shutdown began is
    /// dropped rather than run.
    ///
    /// Inline runs nest when a task run this way waits and drains in turn.
    /// Past 32 nested runs on one thread this takes nothing and returns
    /// false, keeping the stack bounded however long the queue is.
    pub fn run_pending_task(&self) -> bool {
        self.shared.run_inline()
    }

    /// Stops accepting tasks and, with `wait`, blocks until every worker has
    /// exited.
    ///
    /// Idempotent: later calls (with `wait`) just wait for Stopped.
    ///
    /// # Errors
    ///
    /// [`ShutdownError::FromWorker`] if `wait` is set and the caller is one
    /// of this pool's workers. Shutdown has still begun.
    pub fn shutdown(&self, wait: bool) -> Result<(), ShutdownError> {
        self.shared.begin_shutdown();
        if !wait {
            return Ok(());
        }
        if self.is_current_worker() {
            return Err(ShutdownError::FromWorker);
        }
        self.shared.wait_stopped();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                error!(pool = self.shared.id, "worker thread panicked outside a task");
            }
        }
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn current_state(&self) -> PoolState {
        self.shared.state()
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// True if the calling thread is one of this pool's workers.
    #[must_use]
    pub fn is_current_worker(&self) -> bool {
        self.shared.current_worker().is_some()
    }

    /// Snapshot of the pool's counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            inline_runs: c.inline_runs.load(Ordering::Relaxed),
            queued: self.shared.queue.len(),
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("id", &self.shared.id)
            .field("state", &self.current_state())
            .field("workers", &self.worker_count)
            .field("queue", &self.shared.queue)
            .finish_non_exhaustive()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let wait = !self.is_current_worker();
        let _ = self.shutdown(wait);
    }
}
