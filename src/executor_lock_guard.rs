//! Lock acquisition that keeps a pool worker busy instead of blocked.
//!
//! If every worker of a pool blocks on the same lock, the queued tasks sit
//! unexecuted, possibly including the task that would release the lock.
//! [`ExecutorLockGuard`] avoids that: when the lock is contended and the
//! caller is one of the pool's workers, it runs queued tasks inline between
//! `try_lock` attempts. Any other thread simply blocks in `lock()`.
//!
//! A task run inline may itself wait on a guard and drain further tasks, so
//! waits nest. [`ThreadPool::run_pending_task`] stops taking tasks once 32
//! inline runs are nested on a thread; a guard that deep only backs off and
//! retries `try_lock`. The stack stays bounded, at the cost that a release
//! task queued behind that many waiting guards on every worker is not
//! reached until one of them gets the lock.
//!
//! The lock is released exactly once, when the guard is dropped or
//! [`released`](ExecutorLockGuard::release), including during unwinding.
//!
//! # Re-entrancy
//!
//! Neither [`SpinLock`](crate::SpinLock) nor [`TicketLock`](crate::TicketLock)
//! is re-entrant. A task run inline while waiting must not try to take the
//! lock the waiting frame already holds a guard for; that deadlocks. The
//! same holds for a thread acquiring a lock it already holds.

use std::time::{Duration, Instant};

use crate::pool::ThreadPool;
use crate::sync::{Backoff, RawLock};
use crate::tracing_compat::trace;

/// Scoped hold on a [`RawLock`], acquired cooperatively with a
/// [`ThreadPool`].
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ExecutorLockGuard<'a, L: RawLock + ?Sized> {
    lock: &'a L,
    inline_runs: u64,
}

impl<'a, L: RawLock + ?Sized> ExecutorLockGuard<'a, L> {
    /// Acquires `lock`.
    ///
    /// On one of `pool`'s workers a contended lock is retried after running
    /// one queued task (or a short backoff when the queue is empty). On any
    /// other thread this is a plain blocking `lock()`.
    pub fn new(lock: &'a L, pool: &ThreadPool) -> Self {
        if lock.try_lock() {
            return Self::held(lock, 0);
        }
        if !pool.is_current_worker() {
            lock.lock();
            return Self::held(lock, 0);
        }

        let mut backoff = Backoff::new();
        let mut inline_runs = 0u64;
        loop {
            if pool.run_pending_task() {
                inline_runs += 1;
                backoff.reset();
            } else {
                backoff.snooze();
            }
            if lock.try_lock() {
                trace!(inline_runs, "executor lock acquired after draining");
                return Self::held(lock, inline_runs);
            }
        }
    }

    /// Like [`new`](Self::new), giving up after `timeout`.
    ///
    /// Returns `None` if the lock was not acquired in time. Tasks run while
    /// waiting have run regardless.
    pub fn try_new_for(lock: &'a L, pool: &ThreadPool, timeout: Duration) -> Option<Self> {
        if lock.try_lock() {
            return Some(Self::held(lock, 0));
        }
        if !pool.is_current_worker() {
            return lock.try_lock_for(timeout).then(|| Self::held(lock, 0));
        }

        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::new();
        let mut inline_runs = 0u64;
        loop {
            if pool.run_pending_task() {
                inline_runs += 1;
                backoff.reset();
            } else {
                backoff.snooze();
            }
            if lock.try_lock() {
                return Some(Self::held(lock, inline_runs));
            }
            if Instant::now() >= deadline {
                trace!(inline_runs, "executor lock timed out");
                return None;
            }
        }
    }

    fn held(lock: &'a L, inline_runs: u64) -> Self {
        Self { lock, inline_runs }
    }

    /// Number of pool tasks this guard ran inline while waiting.
    #[must_use]
    pub fn inline_runs(&self) -> u64 {
        self.inline_runs
    }

    /// Releases the lock now.
    pub fn release(self) {
        drop(self);
    }
}

impl<L: RawLock + ?Sized> Drop for ExecutorLockGuard<'_, L> {
    fn drop(&mut self) {
        // SAFETY: every constructor returns a guard only after acquiring the
        // lock, and the guard releases it only here.
        unsafe { self.lock.unlock() };
    }
}
