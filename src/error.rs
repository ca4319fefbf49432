//! Error types and error handling strategy.
//!
//! Each primitive returns its own small error enum (`AcquireError`,
//! `ReleaseError`, `SubmitError`, ...) so callers can match exhaustively on
//! exactly what can go wrong at that call site. All of them convert into the
//! crate-wide [`Error`], which carries an [`ErrorKind`] plus an optional
//! message and source for callers that just want to propagate with `?`.
//!
//! # Error Categories
//!
//! - **Capacity**: a bound was hit (semaphore overflow, full queue, no permits)
//! - **Lifecycle**: the target was closed or shut down
//! - **Timeout**: a timed `try_*` operation gave up
//! - **Configuration**: invalid construction parameters, worker spawn failure
//! - **Task**: a submitted task returned an error or panicked
//! - **Internal**: invariant violations inside the crate (bugs)
//!
//! Precondition violations (unlocking a lock that is not held) are not
//! represented here. They are documented `unsafe` contracts checked with
//! `debug_assert!`.

use core::fmt;
use std::sync::Arc;

use crate::pool::{ShutdownError, SubmitError, TaskFailure, TaskFailureKind};
use crate::sync::{AcquireError, ReleaseError, TryAcquireError};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Capacity ===
    /// Releasing permits would exceed the semaphore's maximum.
    PermitOverflow,
    /// A request asked for more permits than the semaphore can ever hold.
    ExceedsMaxPermits,
    /// No permits were available for a non-blocking acquire.
    NoPermits,
    /// A bounded task queue is full.
    QueueFull,

    // === Lifecycle ===
    /// The thread pool no longer accepts tasks.
    PoolClosed,
    /// The semaphore was closed.
    SemaphoreClosed,
    /// `shutdown(wait = true)` was called from one of the pool's own workers.
    ShutdownFromWorker,

    // === Timeout ===
    /// A timed operation expired before it could complete.
    TimedOut,

    // === Configuration ===
    /// Invalid construction parameters.
    ConfigError,
    /// A worker thread could not be spawned.
    Spawn,

    // === Task ===
    /// A submitted task returned an error.
    TaskFailed,
    /// A submitted task panicked.
    TaskPanicked,

    // === Internal ===
    /// Internal error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::PermitOverflow | Self::ExceedsMaxPermits | Self::NoPermits | Self::QueueFull => {
                ErrorCategory::Capacity
            }
            Self::PoolClosed | Self::SemaphoreClosed | Self::ShutdownFromWorker => {
                ErrorCategory::Lifecycle
            }
            Self::TimedOut => ErrorCategory::Timeout,
            Self::ConfigError | Self::Spawn => ErrorCategory::Configuration,
            Self::TaskFailed | Self::TaskPanicked => ErrorCategory::Task,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::NoPermits | Self::QueueFull | Self::TimedOut => Recoverability::Transient,

            Self::PermitOverflow
            | Self::ExceedsMaxPermits
            | Self::PoolClosed
            | Self::SemaphoreClosed
            | Self::ShutdownFromWorker
            | Self::ConfigError
            | Self::Internal => Recoverability::Permanent,

            Self::Spawn | Self::TaskFailed | Self::TaskPanicked => Recoverability::Unknown,
        }
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.recoverability(), Recoverability::Transient)
    }
}

/// Classification of error recoverability for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Temporary condition; retrying may succeed.
    Transient,
    /// Retrying will not succeed.
    Permanent,
    /// Depends on context the error does not carry.
    Unknown,
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A capacity bound was hit.
    Capacity,
    /// The target was closed or shut down.
    Lifecycle,
    /// A timed operation expired.
    Timeout,
    /// Invalid configuration or resource setup.
    Configuration,
    /// A submitted task failed.
    Task,
    /// Internal errors.
    Internal,
}

/// The main error type for this crate.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if the target was closed or shut down.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::PoolClosed | ErrorKind::SemaphoreClosed)
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::TimedOut)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigError).with_message(detail)
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<AcquireError> for Error {
    fn from(e: AcquireError) -> Self {
        let kind = match e {
            AcquireError::Closed => ErrorKind::SemaphoreClosed,
            AcquireError::ExceedsMax { .. } => ErrorKind::ExceedsMaxPermits,
        };
        Self::new(kind).with_message(e.to_string())
    }
}

impl From<TryAcquireError> for Error {
    fn from(e: TryAcquireError) -> Self {
        let kind = match e {
            TryAcquireError::NoPermits => ErrorKind::NoPermits,
            TryAcquireError::TimedOut => ErrorKind::TimedOut,
            TryAcquireError::Closed => ErrorKind::SemaphoreClosed,
            TryAcquireError::ExceedsMax { .. } => ErrorKind::ExceedsMaxPermits,
        };
        Self::new(kind).with_message(e.to_string())
    }
}

impl From<ReleaseError> for Error {
    fn from(e: ReleaseError) -> Self {
        Self::new(ErrorKind::PermitOverflow).with_message(e.to_string())
    }
}

impl From<SubmitError> for Error {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Closed => Self::new(ErrorKind::PoolClosed),
            SubmitError::Full => Self::new(ErrorKind::QueueFull),
        }
    }
}

impl From<ShutdownError> for Error {
    fn from(e: ShutdownError) -> Self {
        match e {
            ShutdownError::FromWorker => {
                Self::new(ErrorKind::ShutdownFromWorker).with_message(e.to_string())
            }
        }
    }
}

impl From<TaskFailure> for Error {
    fn from(failure: TaskFailure) -> Self {
        let message = failure.to_string();
        match failure.kind {
            TaskFailureKind::Panicked(_) => Self::new(ErrorKind::TaskPanicked).with_message(message),
            TaskFailureKind::Failed(source) => Self {
                kind: ErrorKind::TaskFailed,
                message: Some(message),
                source: Some(source),
            },
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context message on error.
    ///
    /// # Errors
    ///
    /// Returns the converted error with `msg` attached.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    ///
    /// # Errors
    ///
    /// Returns the converted error with the computed message attached.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Underlying;

    impl fmt::Display for Underlying {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "underlying")
        }
    }

    impl std::error::Error for Underlying {}

    #[test]
    fn display_without_message() {
        let err = Error::new(ErrorKind::Internal);
        assert_eq!(err.to_string(), "Internal");
    }

    #[test]
    fn display_with_message() {
        let err = Error::new(ErrorKind::QueueFull).with_message("16 tasks queued");
        assert_eq!(err.to_string(), "QueueFull: 16 tasks queued");
    }

    #[test]
    fn source_chain_is_exposed() {
        let err = Error::new(ErrorKind::TaskFailed)
            .with_message("outer")
            .with_source(Underlying);
        let source = err.source().expect("source missing");
        assert_eq!(source.to_string(), "underlying");
    }

    #[test]
    fn from_submit_error() {
        let closed: Error = SubmitError::Closed.into();
        assert_eq!(closed.kind(), ErrorKind::PoolClosed);
        assert!(closed.is_closed());

        let full: Error = SubmitError::Full.into();
        assert_eq!(full.kind(), ErrorKind::QueueFull);
        assert!(full.is_retryable());
    }

    #[test]
    fn from_task_failure_keeps_source() {
        let failed: Error = TaskFailure {
            worker: Some(1),
            kind: TaskFailureKind::Failed(Arc::new(Underlying)),
        }
        .into();
        assert_eq!(failed.kind(), ErrorKind::TaskFailed);
        assert_eq!(failed.category(), ErrorCategory::Task);
        assert_eq!(failed.message(), Some("task failed: underlying (worker 1)"));
        assert_eq!(failed.source().map(ToString::to_string), Some("underlying".to_string()));

        let panicked: Error = TaskFailure {
            worker: None,
            kind: TaskFailureKind::Panicked("boom".into()),
        }
        .into();
        assert_eq!(panicked.kind(), ErrorKind::TaskPanicked);
        assert!(panicked.source().is_none());
    }

    #[test]
    fn from_semaphore_errors() {
        let overflow: Error = ReleaseError::Overflow {
            released: 1,
            available: 2,
            max: 2,
        }
        .into();
        assert_eq!(overflow.kind(), ErrorKind::PermitOverflow);
        assert_eq!(overflow.category(), ErrorCategory::Capacity);

        let timed_out: Error = TryAcquireError::TimedOut.into();
        assert!(timed_out.is_timeout());

        let too_big: Error = AcquireError::ExceedsMax {
            requested: 3,
            max: 2,
        }
        .into();
        assert_eq!(too_big.kind(), ErrorKind::ExceedsMaxPermits);
        assert!(!too_big.is_retryable());
    }

    #[test]
    fn result_ext_adds_message() {
        let res: core::result::Result<(), SubmitError> = Err(SubmitError::Closed);
        let err = res.context("submitting flush").expect_err("expected err");
        assert_eq!(err.kind(), ErrorKind::PoolClosed);
        assert_eq!(err.to_string(), "PoolClosed: submitting flush");
    }

    #[test]
    fn error_kind_category_coverage() {
        use ErrorCategory::*;
        let cases: &[(ErrorKind, ErrorCategory)] = &[
            (ErrorKind::PermitOverflow, Capacity),
            (ErrorKind::ExceedsMaxPermits, Capacity),
            (ErrorKind::NoPermits, Capacity),
            (ErrorKind::QueueFull, Capacity),
            (ErrorKind::PoolClosed, Lifecycle),
            (ErrorKind::SemaphoreClosed, Lifecycle),
            (ErrorKind::ShutdownFromWorker, Lifecycle),
            (ErrorKind::TimedOut, Timeout),
            (ErrorKind::ConfigError, Configuration),
            (ErrorKind::Spawn, Configuration),
            (ErrorKind::TaskFailed, Task),
            (ErrorKind::TaskPanicked, Task),
            (ErrorKind::Internal, Internal),
        ];
        for (kind, expected) in cases {
            assert_eq!(kind.category(), *expected, "{kind:?}");
        }
    }

    #[test]
    fn recoverability_classification() {
        assert!(ErrorKind::NoPermits.is_retryable());
        assert!(ErrorKind::TimedOut.is_retryable());
        assert!(ErrorKind::PoolClosed.recoverability().eq(&Recoverability::Permanent));
        assert_eq!(
            ErrorKind::TaskPanicked.recoverability(),
            Recoverability::Unknown
        );
    }
}
