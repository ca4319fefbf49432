//! FIFO ticket lock.
//!
//! Two counters: `next_ticket` (the next ticket to hand out) and
//! `now_serving` (the ticket allowed into the critical section). `lock`
//! takes a ticket with `fetch_add` and waits for its number to come up;
//! `unlock` advances `now_serving` by one. Threads therefore enter in exactly
//! the order they took tickets.
//!
//! Both counters wrap modulo `usize::MAX + 1`. Only equality and wrapping
//! differences are ever computed, so wraparound is harmless as long as fewer
//! than `usize::MAX` threads wait at once.
//!
//! `try_lock` never takes a ticket it cannot use: it claims ticket
//! `now_serving` with a compare-exchange on `next_ticket`, which only
//! succeeds when nobody holds or waits for the lock.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::backoff::{Backoff, BackoffConfig};
use super::raw::{LockGuard, RawLock};

/// Fair FIFO mutual exclusion lock.
///
/// Each counter sits on its own cache line, so arriving threads do not
/// invalidate the line the waiters spin on.
#[derive(Debug)]
pub struct TicketLock {
    // Written by every arriving thread.
    next_ticket: CachePadded<AtomicUsize>,
    // Written only by the holder, read by every waiter.
    now_serving: CachePadded<AtomicUsize>,
}

impl TicketLock {
    /// Creates an unlocked ticket lock.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates an unlocked lock whose first ticket is `ticket`.
    const fn starting_at(ticket: usize) -> Self {
        Self {
            next_ticket: CachePadded::new(AtomicUsize::new(ticket)),
            now_serving: CachePadded::new(AtomicUsize::new(ticket)),
        }
    }

    /// Acquires the lock only if nobody holds or waits for it.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let serving = self.now_serving.load(Ordering::Acquire);
        self.next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Takes a ticket and waits for it to be served.
    ///
    /// Spins briefly, then yields the thread between checks.
    pub fn lock(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        if self.now_serving.load(Ordering::Acquire) == ticket {
            return;
        }
        let mut backoff = Backoff::with_config(BackoffConfig::SPIN_THEN_YIELD);
        while self.now_serving.load(Ordering::Acquire) != ticket {
            backoff.snooze();
        }
    }

    /// Retries [`try_lock`](Self::try_lock) until it succeeds or `timeout`
    /// elapses.
    ///
    /// No ticket is taken while waiting, so a timed-out attempt leaves the
    /// queue untouched. The flip side: a timed attempt only gets in when the
    /// lock is momentarily free with nobody queued, and so does not share in
    /// the FIFO guarantee of [`lock`](Self::lock).
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        if self.try_lock() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::with_config(BackoffConfig::SPIN_THEN_YIELD);
        loop {
            if self.try_lock() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            backoff.snooze();
        }
    }

    /// Serves the next ticket.
    ///
    /// # Safety
    ///
    /// The calling context must hold the lock. Debug builds panic when the
    /// lock is not held.
    #[inline]
    pub unsafe fn unlock(&self) {
        debug_assert!(
            self.is_locked(),
            "TicketLock::unlock called on an unlocked lock"
        );
        self.now_serving.fetch_add(1, Ordering::Release);
    }

    /// Advisory snapshot of whether the lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.queue_len() != 0
    }

    /// Holder plus waiters, as a snapshot.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        let serving = self.now_serving.load(Ordering::Relaxed);
        let next = self.next_ticket.load(Ordering::Relaxed);
        next.wrapping_sub(serving)
    }

    /// Waits for the lock and returns a guard that unlocks on drop.
    pub fn guard(&self) -> LockGuard<'_, Self> {
        LockGuard::new(self)
    }

    /// Returns a guard if the lock is free with nobody queued.
    pub fn try_guard(&self) -> Option<LockGuard<'_, Self>> {
        LockGuard::try_new(self)
    }
}

impl Default for TicketLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: each ticket is handed out once by `fetch_add`/compare-exchange on
// `next_ticket`, and only the holder of ticket `now_serving` may proceed.
// Waiters load `now_serving` with Acquire, pairing with the Release increment
// in `unlock`.
unsafe impl RawLock for TicketLock {
    #[inline]
    fn try_lock(&self) -> bool {
        TicketLock::try_lock(self)
    }

    fn lock(&self) {
        TicketLock::lock(self);
    }

    fn try_lock_for(&self, timeout: Duration) -> bool {
        TicketLock::try_lock_for(self, timeout)
    }

    unsafe fn unlock(&self) {
        // SAFETY: forwarded caller contract.
        unsafe { TicketLock::unlock(self) }
    }

    fn is_locked(&self) -> bool {
        TicketLock::is_locked(self)
    }
}
