//! The pool's shared FIFO task queue.
//!
//! Tasks live in a lock-free [`SegQueue`]. Idle workers block on the `items`
//! semaphore: every push releases one permit, and a worker takes one permit
//! before each pop attempt. A task taken by
//! [`ThreadPool::run_pending_task`](super::ThreadPool::run_pending_task)
//! leaves a permit behind, which costs one worker a spurious wakeup and
//! nothing else.
//!
//! Bounded queues also hold a `slots` semaphore with one permit per free
//! place. Push takes a slot, pop gives it back.
//!
//! Shutdown happens in two steps. [`close_slots`](TaskQueue::close_slots)
//! fails submitters blocked on a full queue. [`close`](TaskQueue::close)
//! wakes idle workers once no further push can happen. A worker that reads
//! `is_closed() == true` and then pops `None` knows the queue is drained for
//! good.

use crossbeam_queue::SegQueue;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::SubmitError;
use super::sink::TaskError;
use crate::sync::{Semaphore, TryAcquireError};
use crate::tracing_compat::error;

/// A queued unit of work.
pub(crate) type Task = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

pub(crate) struct TaskQueue {
    tasks: SegQueue<Task>,
    /// Queued tasks. Raised before the push, lowered after the pop, so it
    /// never underflows.
    len: AtomicUsize,
    items: Semaphore,
    slots: Option<Semaphore>,
    capacity: usize,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` tasks (0 = unbounded).
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tasks: SegQueue::new(),
            len: AtomicUsize::new(0),
            items: Semaphore::new(0),
            slots: (capacity > 0).then(|| Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Enqueues `task`, waiting for a free slot if the queue is bounded.
    pub(crate) fn push(&self, task: Task) -> Result<(), SubmitError> {
        if let Some(slots) = &self.slots {
            slots.acquire(1).map_err(|_| SubmitError::Closed)?;
        }
        self.enqueue(task);
        Ok(())
    }

    /// Enqueues `task` only if a slot is free right now. A rejected task is
    /// handed back with the reason.
    pub(crate) fn try_push(&self, task: Task) -> Result<(), (Task, SubmitError)> {
        if let Some(slots) = &self.slots {
            if let Err(err) = slots.try_acquire(1) {
                let reason = match err {
                    TryAcquireError::Closed => SubmitError::Closed,
                    _ => SubmitError::Full,
                };
                return Err((task, reason));
            }
        }
        self.enqueue(task);
        Ok(())
    }

    fn enqueue(&self, task: Task) {
        self.len.fetch_add(1, Ordering::Relaxed);
        self.tasks.push(task);
        if let Err(err) = self.items.release(1) {
            error!(%err, "task queue signal overflowed");
        }
    }

    /// Takes the oldest task, if any.
    pub(crate) fn pop(&self) -> Option<Task> {
        let task = self.tasks.pop()?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        if let Some(slots) = &self.slots {
            if let Err(err) = slots.release(1) {
                error!(%err, "task queue slot release overflowed");
            }
        }
        Some(task)
    }

    /// Blocks until a task may be available. Returns `false` once closed.
    pub(crate) fn wait_for_task(&self) -> bool {
        self.items.acquire(1).is_ok()
    }

    /// Fails current and future waits for a free slot.
    pub(crate) fn close_slots(&self) {
        if let Some(slots) = &self.slots {
            slots.close();
        }
    }

    /// Wakes every idle worker. No push may follow.
    pub(crate) fn close(&self) {
        self.items.close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.items.is_closed()
    }

    /// Snapshot of queued tasks.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Configured bound, or `None` if unbounded.
    pub(crate) fn capacity(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
