//! Thread pool configuration.
//!
//! [`PoolConfig`] holds the concrete values; [`PoolBuilder`] is the usual
//! way to set them.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `worker_threads` | available CPU parallelism |
//! | `thread_name_prefix` | `"niggly-worker"` |
//! | `thread_stack_size` | `None` (platform default) |
//! | `queue_capacity` | 0 (unbounded) |
//! | `shutdown_policy` | [`ShutdownPolicy::Drain`] |
//! | `error_sink` | [`LogSink`] |
//! | `on_thread_start` | `None` |
//! | `on_thread_stop` | `None` |

use std::fmt;
use std::sync::Arc;

use super::ThreadPool;
use super::sink::{ErrorSink, LogSink};
use crate::error::Error;

const DEFAULT_THREAD_NAME_PREFIX: &str = "niggly-worker";

/// What happens to tasks still queued when shutdown begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Run every queued task before the workers exit.
    #[default]
    Drain,
    /// Drop queued tasks without running them.
    Discard,
}

/// Callback run on a worker thread as it starts or stops.
pub type ThreadCallback = Arc<dyn Fn() + Send + Sync>;

/// Thread pool configuration.
#[derive(Clone)]
pub struct PoolConfig {
    /// Number of worker threads (default: available parallelism).
    pub worker_threads: usize,
    /// Name prefix for worker threads; worker `i` is named `{prefix}-{i}`.
    pub thread_name_prefix: String,
    /// Stack size per worker thread. `None` uses the platform default.
    pub thread_stack_size: Option<usize>,
    /// Maximum queued tasks (0 = unbounded).
    pub queue_capacity: usize,
    /// Handling of queued tasks at shutdown.
    pub shutdown_policy: ShutdownPolicy,
    /// Receives every task panic and task error.
    pub error_sink: Arc<dyn ErrorSink>,
    /// Callback executed when a worker thread starts.
    pub on_thread_start: Option<ThreadCallback>,
    /// Callback executed when a worker thread stops.
    pub on_thread_stop: Option<ThreadCallback>,
}

impl PoolConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = 1;
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = DEFAULT_THREAD_NAME_PREFIX.to_string();
        }
        if self.thread_stack_size == Some(0) {
            self.thread_stack_size = None;
        }
    }

    pub(crate) fn default_worker_threads() -> usize {
        std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .max(1)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: Self::default_worker_threads(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            thread_stack_size: None,
            queue_capacity: 0,
            shutdown_policy: ShutdownPolicy::Drain,
            error_sink: Arc::new(LogSink),
            on_thread_start: None,
            on_thread_stop: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("worker_threads", &self.worker_threads)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("thread_stack_size", &self.thread_stack_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("shutdown_policy", &self.shutdown_policy)
            .field("on_thread_start", &self.on_thread_start.is_some())
            .field("on_thread_stop", &self.on_thread_stop.is_some())
            .finish_non_exhaustive()
    }
}

/// Fluent constructor for [`ThreadPool`].
///
/// ```
/// use niggly::pool::{PoolBuilder, ShutdownPolicy};
///
/// let pool = PoolBuilder::new()
///     .worker_threads(2)
///     .queue_capacity(64)
///     .shutdown_policy(ShutdownPolicy::Drain)
///     .build()
///     .expect("spawn workers");
/// assert_eq!(pool.worker_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
#[must_use = "a builder does nothing until `build` is called"]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    /// Starts from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Sets the number of worker threads. Zero is raised to one.
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.config.worker_threads = n;
        self
    }

    /// Sets the worker thread name prefix.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the worker stack size in bytes.
    pub fn thread_stack_size(mut self, bytes: usize) -> Self {
        self.config.thread_stack_size = Some(bytes);
        self
    }

    /// Bounds the task queue. Zero means unbounded.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets what happens to queued tasks at shutdown.
    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown_policy = policy;
        self
    }

    /// Routes task failures to `sink`.
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.config.error_sink = Arc::new(sink);
        self
    }

    /// Runs `f` on each worker thread as it starts.
    pub fn on_thread_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.on_thread_start = Some(Arc::new(f));
        self
    }

    /// Runs `f` on each worker thread as it stops.
    pub fn on_thread_stop(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.on_thread_stop = Some(Arc::new(f));
        self
    }

    /// Returns the configuration as it would be built (before normalizing).
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Spawns the workers.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Spawn`](crate::ErrorKind::Spawn) error if a
    /// worker thread cannot be spawned. Workers spawned before the failure
    /// are shut down first.
    pub fn build(self) -> Result<ThreadPool, Error> {
        ThreadPool::with_config(self.config)
    }
}
