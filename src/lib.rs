//! Niggly: intra-process concurrency primitives.
//!
//! This crate supplies the building blocks an application uses to coordinate
//! work across threads:
//!
//! - [`SpinLock`](sync::SpinLock): busy-wait mutual exclusion for very short
//!   critical sections.
//! - [`TicketLock`](sync::TicketLock): fair, FIFO mutual exclusion.
//! - [`Semaphore`](sync::Semaphore): counting semaphore with strict FIFO
//!   admission and an optional upper bound.
//! - [`ThreadPool`](pool::ThreadPool): fixed set of workers consuming a
//!   shared FIFO task queue.
//! - [`ExecutorLockGuard`]: scoped lock acquisition that keeps a pool
//!   worker busy with queued tasks instead of blocking it.
//!
//! # Ownership
//!
//! Nothing in this crate is a global. Locks, semaphores and pools are
//! constructed explicitly and passed by reference (or `Arc`) to whoever needs
//! them. Worker identity is tagged thread-locally by the pool that spawned the
//! worker, so [`ThreadPool::is_current_worker`](pool::ThreadPool::is_current_worker)
//! answers for one specific pool.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use niggly::pool::ThreadPool;
//! use niggly::sync::TicketLock;
//! use niggly::ExecutorLockGuard;
//!
//! let pool = Arc::new(ThreadPool::new(4).expect("spawn workers"));
//! let lock = Arc::new(TicketLock::new());
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..100 {
//!     let (pool2, lock, counter) = (Arc::clone(&pool), Arc::clone(&lock), Arc::clone(&counter));
//!     pool.submit(move || {
//!         let _guard = ExecutorLockGuard::new(&*lock, &pool2);
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     })
//!     .expect("pool is running");
//! }
//!
//! pool.shutdown(true).expect("not called from a worker");
//! assert_eq!(counter.load(Ordering::Relaxed), 100);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod error;
pub mod executor_lock_guard;
pub mod pool;
pub mod sync;
pub mod util;

mod tracing_compat;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, ErrorKind, Result};
pub use executor_lock_guard::ExecutorLockGuard;
pub use pool::{PoolBuilder, PoolConfig, PoolState, ThreadPool};
pub use sync::{RawLock, Semaphore, SpinLock, TicketLock};
