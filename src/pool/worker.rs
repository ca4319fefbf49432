//! Worker threads and worker identity.
//!
//! Each worker tags its thread with a [`WorkerContext`] naming the pool that
//! spawned it. [`current`] reads the tag; it is how the pool (and
//! [`ExecutorLockGuard`](crate::ExecutorLockGuard)) tells its own workers
//! from every other thread.
//!
//! The module also tracks how deeply inline task runs nest on a thread. A
//! task run inline by a waiting frame may itself wait and run further tasks
//! inline; [`InlineScope`] caps that recursion at [`MAX_INLINE_DEPTH`] so a
//! long queue cannot exhaust the thread's stack.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::{Shared, ThreadCallback};
use crate::tracing_compat::{debug, error, trace};

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerContext>> = const { Cell::new(None) };
    static INLINE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Most inline task runs that may be nested on one thread.
pub(crate) const MAX_INLINE_DEPTH: u32 = 32;

/// Identity of a pool worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerContext {
    /// Id of the owning pool.
    pub(crate) pool_id: u64,
    /// Worker index within the pool.
    pub(crate) index: usize,
}

/// Returns the calling thread's worker tag, if it is a pool worker.
pub(crate) fn current() -> Option<WorkerContext> {
    CURRENT_WORKER.with(Cell::get)
}

/// Scoped setter for the thread-local worker tag.
#[derive(Debug)]
pub(crate) struct ScopedWorker {
    prev: Option<WorkerContext>,
}

impl ScopedWorker {
    pub(crate) fn enter(ctx: WorkerContext) -> Self {
        let prev = CURRENT_WORKER.with(|cell| cell.replace(Some(ctx)));
        Self { prev }
    }
}

impl Drop for ScopedWorker {
    fn drop(&mut self) {
        CURRENT_WORKER.with(|cell| cell.set(self.prev.take()));
    }
}

/// One level of inline task execution on the calling thread.
#[derive(Debug)]
pub(crate) struct InlineScope {
    _private: (),
}

impl InlineScope {
    /// Enters one more level, or returns `None` at [`MAX_INLINE_DEPTH`].
    pub(crate) fn enter() -> Option<Self> {
        INLINE_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_INLINE_DEPTH {
                return None;
            }
            depth.set(current + 1);
            Some(Self { _private: () })
        })
    }
}

impl Drop for InlineScope {
    fn drop(&mut self) {
        INLINE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Inline task runs currently nested on the calling thread.
pub(crate) fn inline_depth() -> u32 {
    INLINE_DEPTH.with(Cell::get)
}

/// Accounts for the worker's exit however `run` leaves.
struct ExitGuard<'a> {
    shared: &'a Shared,
    index: usize,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(pool = self.shared.id, worker = self.index, "worker unwinding");
        }
        self.shared.worker_exited();
    }
}

fn run_hook(hook: Option<&ThreadCallback>, shared: &Shared, index: usize, name: &'static str) {
    let Some(hook) = hook else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
        error!(pool = shared.id, worker = index, hook = name, "thread hook panicked");
    }
}

/// Body of a worker thread.
///
/// Pops tasks in FIFO order until the queue is closed and empty. A closed
/// flag read *before* an empty pop means no task can still arrive.
pub(super) fn run(shared: Arc<Shared>, index: usize) {
    let _exit = ExitGuard {
        shared: &shared,
        index,
    };
    let _scope = ScopedWorker::enter(WorkerContext {
        pool_id: shared.id,
        index,
    });
    run_hook(shared.on_thread_start.as_ref(), &shared, index, "on_thread_start");
    debug!(pool = shared.id, worker = index, "worker started");

    let mut executed = 0u64;
    loop {
        let closed = shared.queue.is_closed();
        match shared.queue.pop() {
            Some(task) => {
                trace!(worker = index, "running task");
                if shared.dispatch(task, Some(index)) {
                    executed += 1;
                }
            }
            None if closed => break,
            None => {
                // `false` means closed: the next round drains and exits.
                let _ = shared.queue.wait_for_task();
            }
        }
    }

    run_hook(shared.on_thread_stop.as_ref(), &shared, index, "on_thread_stop");
    debug!(pool = shared.id, worker = index, executed, "worker stopped");
}
