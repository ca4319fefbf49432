//! Counting semaphore with strict FIFO admission.
//!
//! A semaphore holds a count of available permits. `acquire(n)` blocks the
//! calling thread until it can take `n` permits; `release(n)` gives them back.
//!
//! # Admission policy
//!
//! Admission is **strictly FIFO**. A blocked acquirer proceeds only when it is
//! at the front of the wait queue *and* enough permits are available. A large
//! request at the front therefore holds back smaller requests behind it, even
//! when those could be satisfied right now. This prevents large requests from
//! starving. The non-blocking [`Semaphore::try_acquire`] never jumps the queue
//! either: it fails while anyone is waiting.
//!
//! # Bounds
//!
//! A semaphore built with [`Semaphore::bounded`] never holds more than `max`
//! permits. A `release` that would exceed the bound fails with
//! [`ReleaseError::Overflow`] and changes nothing; it is never clamped.
//!
//! # Example
//!
//! ```
//! use niggly::sync::Semaphore;
//!
//! let sem = Semaphore::bounded(2, 2).expect("initial <= max");
//! sem.acquire(1).expect("permit");
//! assert_eq!(sem.available_permits(), 1);
//! sem.release(1).expect("within bound");
//! assert!(sem.release(1).is_err());
//! ```

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::tracing_compat::warn;

/// Error returned by blocking acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The semaphore was closed.
    #[error("semaphore closed")]
    Closed,
    /// More permits were requested than the semaphore can ever hold.
    #[error("requested {requested} permits but the semaphore holds at most {max}")]
    ExceedsMax {
        /// Permits requested.
        requested: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Error returned by non-blocking and timed acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryAcquireError {
    /// Not enough permits, or other threads are queued ahead.
    #[error("no semaphore permits available")]
    NoPermits,
    /// The timeout elapsed before the permits could be reserved.
    #[error("timed out waiting for semaphore permits")]
    TimedOut,
    /// The semaphore was closed.
    #[error("semaphore closed")]
    Closed,
    /// More permits were requested than the semaphore can ever hold.
    #[error("requested {requested} permits but the semaphore holds at most {max}")]
    ExceedsMax {
        /// Permits requested.
        requested: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl From<AcquireError> for TryAcquireError {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::Closed => Self::Closed,
            AcquireError::ExceedsMax { requested, max } => Self::ExceedsMax { requested, max },
        }
    }
}

/// Error returned by [`Semaphore::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReleaseError {
    /// Releasing would push the count past its maximum.
    #[error("releasing {released} permits with {available} available would exceed the maximum of {max}")]
    Overflow {
        /// Permits being released.
        released: usize,
        /// Permits available before the release.
        available: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// A counting semaphore for bounding concurrent resource use.
#[derive(Debug)]
pub struct Semaphore {
    /// Permits and waiters.
    state: Mutex<SemaphoreState>,
    /// Lock-free shadow of available permits for diagnostics.
    permits_shadow: AtomicUsize,
    /// Lock-free shadow of closed state for fast checks.
    closed_shadow: AtomicBool,
    /// Upper bound on available permits; `None` means unbounded.
    max_permits: Option<usize>,
}

#[derive(Debug)]
struct SemaphoreState {
    /// Number of available permits.
    permits: usize,
    /// Whether the semaphore is closed.
    closed: bool,
    /// FIFO queue of blocked acquirers.
    waiters: VecDeque<Waiter>,
    /// Next waiter id.
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    count: usize,
    // Per-waiter so a release wakes exactly the front of the queue.
    signal: Arc<Condvar>,
}

impl SemaphoreState {
    /// Returns the front waiter's signal if its request can now be met.
    fn ready_front_signal(&self) -> Option<Arc<Condvar>> {
        self.waiters
            .front()
            .filter(|w| self.permits >= w.count)
            .map(|w| Arc::clone(&w.signal))
    }

    fn remove_waiter(&mut self, waiter_id: u64) {
        if self.waiters.front().is_some_and(|w| w.id == waiter_id) {
            self.waiters.pop_front();
        } else if let Some(pos) = self.waiters.iter().position(|w| w.id == waiter_id) {
            self.waiters.remove(pos);
        }
    }
}

impl Semaphore {
    /// Creates an unbounded semaphore with `permits` available.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self::with_limit(permits, None)
    }

    /// Creates a semaphore with `initial` permits that never holds more than
    /// `max`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `initial > max`.
    pub fn bounded(initial: usize, max: usize) -> Result<Self, Error> {
        if initial > max {
            return Err(Error::config(format!(
                "initial permits {initial} exceed maximum {max}"
            )));
        }
        Ok(Self::with_limit(initial, Some(max)))
    }

    fn with_limit(permits: usize, max_permits: Option<usize>) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                permits,
                closed: false,
                waiters: VecDeque::with_capacity(4),
                next_waiter_id: 0,
            }),
            permits_shadow: AtomicUsize::new(permits),
            closed_shadow: AtomicBool::new(false),
            max_permits,
        }
    }

    /// Returns the number of currently available permits (snapshot).
    #[must_use]
    pub fn available_permits(&self) -> usize {
        // Relaxed: advisory only; every decision re-reads under the lock.
        self.permits_shadow.load(Ordering::Relaxed)
    }

    /// Returns the configured maximum, if bounded.
    #[must_use]
    pub fn max_permits(&self) -> Option<usize> {
        self.max_permits
    }

    /// Returns the number of blocked acquirers (snapshot).
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Returns true if the semaphore is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed_shadow.load(Ordering::Acquire)
    }

    /// Closes the semaphore, failing all current and future acquisitions.
    ///
    /// `release` keeps working so outstanding permits can still be returned.
    pub fn close(&self) {
        let taken = {
            let mut state = self.state.lock();
            state.closed = true;
            self.closed_shadow.store(true, Ordering::Release);
            std::mem::take(&mut state.waiters)
        };
        for waiter in taken {
            waiter.signal.notify_one();
        }
    }

    /// Blocks until `count` permits can be reserved, then reserves them.
    ///
    /// Requests for zero permits succeed immediately.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::ExceedsMax`] if `count` is larger than the bound.
    /// - [`AcquireError::Closed`] if the semaphore is or becomes closed.
    pub fn acquire(&self, count: usize) -> Result<(), AcquireError> {
        self.acquire_until(count, None).map_err(|e| match e {
            TryAcquireError::ExceedsMax { requested, max } => {
                AcquireError::ExceedsMax { requested, max }
            }
            // Without a deadline the wait only ends by success or close.
            TryAcquireError::Closed | TryAcquireError::TimedOut | TryAcquireError::NoPermits => {
                AcquireError::Closed
            }
        })
    }

    /// Reserves `count` permits if that is possible without waiting.
    ///
    /// Fails while other threads are queued, even if enough permits are
    /// available.
    ///
    /// # Errors
    ///
    /// [`TryAcquireError::NoPermits`], [`TryAcquireError::Closed`] or
    /// [`TryAcquireError::ExceedsMax`].
    pub fn try_acquire(&self, count: usize) -> Result<(), TryAcquireError> {
        self.check_bound(count)?;
        if count == 0 {
            return Ok(());
        }
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryAcquireError::Closed);
        }
        if !state.waiters.is_empty() || state.permits < count {
            return Err(TryAcquireError::NoPermits);
        }
        self.take(&mut state, count);
        Ok(())
    }

    /// Waits up to `timeout` to reserve `count` permits.
    ///
    /// # Errors
    ///
    /// [`TryAcquireError::TimedOut`] when the timeout elapses first; the
    /// caller's place in the queue is given up. Also `Closed` and
    /// `ExceedsMax` as for [`acquire`](Self::acquire).
    pub fn try_acquire_for(&self, count: usize, timeout: Duration) -> Result<(), TryAcquireError> {
        self.acquire_until(count, Some(Instant::now() + timeout))
    }

    /// Returns `count` permits and wakes the front waiter if it can proceed.
    ///
    /// # Errors
    ///
    /// [`ReleaseError::Overflow`] if the release would exceed the bound (or
    /// `usize::MAX`). The count is left unchanged.
    pub fn release(&self, count: usize) -> Result<(), ReleaseError> {
        if count == 0 {
            return Ok(());
        }
        let signal = {
            let mut state = self.state.lock();
            let max = self.max_permits.unwrap_or(usize::MAX);
            let next = state
                .permits
                .checked_add(count)
                .filter(|&next| next <= max)
                .ok_or(ReleaseError::Overflow {
                    released: count,
                    available: state.permits,
                    max,
                })?;
            state.permits = next;
            self.permits_shadow.store(next, Ordering::Relaxed);
            state.ready_front_signal()
        };
        if let Some(signal) = signal {
            signal.notify_one();
        }
        Ok(())
    }

    /// Like [`acquire`](Self::acquire), returning a guard that releases the
    /// permits on drop.
    ///
    /// # Errors
    ///
    /// As for [`acquire`](Self::acquire).
    pub fn acquire_permit(&self, count: usize) -> Result<SemaphorePermit<'_>, AcquireError> {
        self.acquire(count)?;
        Ok(SemaphorePermit {
            semaphore: self,
            count,
        })
    }

    /// Like [`try_acquire`](Self::try_acquire), returning a guard that
    /// releases the permits on drop.
    ///
    /// # Errors
    ///
    /// As for [`try_acquire`](Self::try_acquire).
    pub fn try_acquire_permit(&self, count: usize) -> Result<SemaphorePermit<'_>, TryAcquireError> {
        self.try_acquire(count)?;
        Ok(SemaphorePermit {
            semaphore: self,
            count,
        })
    }

    fn check_bound(&self, count: usize) -> Result<(), AcquireError> {
        match self.max_permits {
            Some(max) if count > max => Err(AcquireError::ExceedsMax {
                requested: count,
                max,
            }),
            _ => Ok(()),
        }
    }

    fn take(&self, state: &mut SemaphoreState, count: usize) {
        state.permits -= count;
        self.permits_shadow.store(state.permits, Ordering::Relaxed);
    }

    fn acquire_until(&self, count: usize, deadline: Option<Instant>) -> Result<(), TryAcquireError> {
        self.check_bound(count)?;
        if count == 0 {
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(TryAcquireError::Closed);
        }
        if state.waiters.is_empty() && state.permits >= count {
            self.take(&mut state, count);
            return Ok(());
        }

        let id = state.next_waiter_id;
        state.next_waiter_id = state.next_waiter_id.wrapping_add(1);
        let signal = Arc::new(Condvar::new());
        state.waiters.push_back(Waiter {
            id,
            count,
            signal: Arc::clone(&signal),
        });

        loop {
            if state.closed {
                // `close` already emptied the queue.
                return Err(TryAcquireError::Closed);
            }

            let is_front = state.waiters.front().is_some_and(|w| w.id == id);
            if is_front && state.permits >= count {
                state.waiters.pop_front();
                self.take(&mut state, count);
                // A single release may cover several queued requests.
                let next = state.ready_front_signal();
                drop(state);
                if let Some(next) = next {
                    next.notify_one();
                }
                return Ok(());
            }

            match deadline {
                None => signal.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        state.remove_waiter(id);
                        // Leaving may unblock a smaller request that was
                        // queued behind us.
                        let next = state.ready_front_signal();
                        drop(state);
                        if let Some(next) = next {
                            next.notify_one();
                        }
                        return Err(TryAcquireError::TimedOut);
                    }
                    let _ = signal.wait_until(&mut state, deadline);
                }
            }
        }
    }
}

/// Permits held from a [`Semaphore`], released on drop.
#[must_use = "permits are released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
    count: usize,
}

impl SemaphorePermit<'_> {
    /// Returns the number of permits held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Keeps the permits acquired without releasing them.
    pub fn forget(self) {
        let _ = std::mem::ManuallyDrop::new(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.semaphore.release(self.count) {
            // Someone released permits they never acquired.
            warn!(%err, "dropped semaphore permit could not be returned");
        }
    }
}
