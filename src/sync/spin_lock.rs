//! Test-and-test-and-set spin lock.
//!
//! Acquisition never deschedules the caller: contended `lock` busy-waits
//! with exponential backoff ([`BackoffConfig::SPIN_ONLY`]). There is no
//! fairness; under heavy contention a thread can be starved indefinitely.
//! Use it only for critical sections shorter than a context switch. For
//! anything longer prefer [`TicketLock`](super::TicketLock) or
//! [`ExecutorLockGuard`](crate::ExecutorLockGuard).
//!
//! # Example
//!
//! ```
//! use niggly::sync::SpinLock;
//!
//! let lock = SpinLock::new();
//! {
//!     let _guard = lock.guard();
//!     assert!(lock.is_locked());
//! }
//! assert!(!lock.is_locked());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::backoff::{Backoff, BackoffConfig};
use super::raw::{LockGuard, RawLock};

/// Busy-wait mutual exclusion lock.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    /// Creates an unlocked spin lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Attempts one acquisition. Never waits.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spins until the lock is acquired.
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }
        let mut backoff = Backoff::with_config(BackoffConfig::SPIN_ONLY);
        loop {
            // Wait on a plain load so contending threads do not bounce the
            // cache line with failed read-modify-writes.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
            if self.try_lock() {
                return;
            }
        }
    }

    /// Spins until the lock is acquired or `timeout` elapses.
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        if self.try_lock() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::with_config(BackoffConfig::SPIN_ONLY);
        loop {
            if !self.locked.load(Ordering::Relaxed) && self.try_lock() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            backoff.snooze();
        }
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The calling context must hold the lock. Debug builds panic when the
    /// lock is not held.
    #[inline]
    pub unsafe fn unlock(&self) {
        let was_locked = self.locked.swap(false, Ordering::Release);
        debug_assert!(was_locked, "SpinLock::unlock called on an unlocked lock");
    }

    /// Advisory snapshot of whether the lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Spins until acquired and returns a guard that unlocks on drop.
    pub fn guard(&self) -> LockGuard<'_, Self> {
        LockGuard::new(self)
    }

    /// Returns a guard if the lock is free.
    pub fn try_guard(&self) -> Option<LockGuard<'_, Self>> {
        LockGuard::try_new(self)
    }
}

// SAFETY: the compare-exchange from `false` to `true` admits one holder;
// Acquire on success pairs with the Release store in `unlock`.
unsafe impl RawLock for SpinLock {
    #[inline]
    fn try_lock(&self) -> bool {
        SpinLock::try_lock(self)
    }

    fn lock(&self) {
        SpinLock::lock(self);
    }

    fn try_lock_for(&self, timeout: Duration) -> bool {
        SpinLock::try_lock_for(self, timeout)
    }

    unsafe fn unlock(&self) {
        // SAFETY: forwarded caller contract.
        unsafe { SpinLock::unlock(self) }
    }

    fn is_locked(&self) -> bool {
        SpinLock::is_locked(self)
    }
}
