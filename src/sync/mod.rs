//! Locks, semaphores and the backoff they share.
//!
//! # Primitives
//!
//! - [`SpinLock`]: busy-wait mutual exclusion, no fairness
//! - [`TicketLock`]: FIFO mutual exclusion
//! - [`Semaphore`]: counting semaphore with strict FIFO admission
//!
//! Both locks implement [`RawLock`], so [`LockGuard`] and
//! [`ExecutorLockGuard`](crate::ExecutorLockGuard) work with either.
//!
//! # Releasing
//!
//! Locks are released by their guard's `Drop`, including during unwinding.
//! Calling `unlock` by hand is `unsafe`: the caller must hold the lock.

mod backoff;
mod raw;
mod semaphore;
mod spin_lock;
mod ticket_lock;

pub use backoff::{Backoff, BackoffConfig, CpuRelax, Relax};
pub use raw::{LockGuard, RawLock};
pub use semaphore::{AcquireError, ReleaseError, Semaphore, SemaphorePermit, TryAcquireError};
pub use spin_lock::SpinLock;
pub use ticket_lock::TicketLock;
