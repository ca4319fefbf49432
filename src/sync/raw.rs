//! The raw lock interface shared by [`SpinLock`](super::SpinLock) and
//! [`TicketLock`](super::TicketLock).
//!
//! Raw locks protect no data of their own; they hand out exclusive access to
//! "the critical section" and leave the pairing of `lock` and `unlock` to the
//! caller. [`LockGuard`] and [`ExecutorLockGuard`](crate::ExecutorLockGuard)
//! pair them automatically.

use std::time::Duration;

/// A mutual-exclusion lock with explicit `lock`/`unlock`.
///
/// # Safety
///
/// Implementations must guarantee mutual exclusion: after `try_lock`,
/// `try_lock_for` returned `true` or `lock` returned, no other acquisition
/// may succeed until `unlock` is called. Acquisitions must synchronize-with
/// the preceding `unlock` (acquire/release ordering) so writes made inside
/// one critical section are visible in the next.
pub unsafe trait RawLock {
    /// Attempts to acquire the lock without waiting.
    fn try_lock(&self) -> bool;

    /// Acquires the lock, waiting as long as necessary.
    fn lock(&self);

    /// Attempts to acquire the lock, giving up after `timeout`.
    fn try_lock_for(&self, timeout: Duration) -> bool;

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The lock must be held, and the caller must be the party that acquired
    /// it (or have taken over that responsibility). Releasing an unheld lock
    /// breaks mutual exclusion for whoever acquires next.
    unsafe fn unlock(&self);

    /// Advisory snapshot of whether the lock is currently held.
    fn is_locked(&self) -> bool;
}

/// RAII guard releasing a [`RawLock`] exactly once, on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a, L: RawLock + ?Sized> {
    lock: &'a L,
}

impl<'a, L: RawLock + ?Sized> LockGuard<'a, L> {
    /// Blocks until `lock` is acquired.
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock }
    }

    /// Acquires `lock` if it is free.
    pub fn try_new(lock: &'a L) -> Option<Self> {
        lock.try_lock().then_some(Self { lock })
    }

    /// Acquires `lock`, giving up after `timeout`.
    pub fn try_new_for(lock: &'a L, timeout: Duration) -> Option<Self> {
        lock.try_lock_for(timeout).then_some(Self { lock })
    }

    /// Wraps a lock the caller already holds.
    ///
    /// # Safety
    ///
    /// `lock` must be held by the caller, and nothing else may release it.
    pub unsafe fn adopt(lock: &'a L) -> Self {
        Self { lock }
    }

    /// Releases the lock now.
    pub fn release(self) {
        drop(self);
    }
}

impl<L: RawLock + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        // SAFETY: a guard only exists while its lock is held, and this is the
        // single place the guard releases it.
        unsafe { self.lock.unlock() };
    }
}
