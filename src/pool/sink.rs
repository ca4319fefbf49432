//! Error sinks for task failures.
//!
//! A task that panics or returns `Err` never takes its worker down. The
//! worker catches the failure at the pool boundary and hands a
//! [`TaskFailure`] to the pool's [`ErrorSink`].
//!
//! # Backends
//!
//! - [`LogSink`]: logs each failure at `error` level (the default).
//! - [`CollectorSink`]: in-memory collection, for tests and diagnostics.
//! - [`FnSink`]: forwards to a closure.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::tracing_compat::error;

/// Boxed error returned by a fallible task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a task failed.
#[derive(Debug, Clone)]
pub enum TaskFailureKind {
    /// The task panicked; the payload rendered as a string.
    Panicked(String),
    /// The task returned an error.
    Failed(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

/// A failed task, as reported to an [`ErrorSink`].
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Index of the worker that ran the task, or `None` if it ran inline on
    /// a thread outside the pool.
    pub worker: Option<usize>,
    /// What went wrong.
    pub kind: TaskFailureKind,
}

impl TaskFailure {
    /// Returns true if the task panicked.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self.kind, TaskFailureKind::Panicked(_))
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TaskFailureKind::Panicked(msg) => write!(f, "task panicked: {msg}")?,
            TaskFailureKind::Failed(err) => write!(f, "task failed: {err}")?,
        }
        if let Some(worker) = self.worker {
            write!(f, " (worker {worker})")?;
        }
        Ok(())
    }
}

/// Receiver for task failures.
///
/// Implementations must be `Send + Sync`: every worker reports into the same
/// sink. A sink that panics is contained; the failure is then lost.
pub trait ErrorSink: Send + Sync + fmt::Debug {
    /// Records one failure.
    fn report(&self, failure: TaskFailure);
}

/// Logs failures through `tracing` at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, failure: TaskFailure) {
        error!(worker = ?failure.worker, %failure, "pool task failed");
    }
}

/// Stores every failure in memory.
#[derive(Debug, Default)]
pub struct CollectorSink {
    failures: Mutex<Vec<TaskFailure>>,
}

impl CollectorSink {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected failures.
    pub fn failures(&self) -> Vec<TaskFailure> {
        self.failures.lock().clone()
    }

    /// Number of collected failures.
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    /// True if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }
}

impl ErrorSink for CollectorSink {
    fn report(&self, failure: TaskFailure) {
        self.failures.lock().push(failure);
    }
}

impl<S: ErrorSink + ?Sized> ErrorSink for Arc<S> {
    fn report(&self, failure: TaskFailure) {
        (**self).report(failure);
    }
}

/// Forwards failures to a closure.
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(TaskFailure) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

impl<F> ErrorSink for FnSink<F>
where
    F: Fn(TaskFailure) + Send + Sync,
{
    fn report(&self, failure: TaskFailure) {
        (self.0)(failure);
    }
}
