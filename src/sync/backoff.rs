//! Backoff strategy for busy-wait loops.
//!
//! The algorithm (exponential growth, cap, jitter, spin-to-yield escalation)
//! lives in [`Backoff`]; the actual pause primitive sits behind [`Relax`] so
//! the algorithm can be driven by a recording implementation in tests.
//!
//! The schedule mirrors the worker idle loop: spin with `spin_loop` hints for
//! a bounded number of rounds, then fall back to `yield_now`.

use crate::util::DetRng;

/// The pause primitive a [`Backoff`] drives.
pub trait Relax {
    /// Busy-waits for `iterations` pause hints.
    fn spin(&mut self, iterations: u32);

    /// Gives up the rest of the time slice.
    fn yield_now(&mut self);
}

/// [`Relax`] backed by `std::hint::spin_loop` and `std::thread::yield_now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuRelax;

impl Relax for CpuRelax {
    #[inline]
    fn spin(&mut self, iterations: u32) {
        for _ in 0..iterations {
            std::hint::spin_loop();
        }
    }

    #[inline]
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Tuning for [`Backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Spin iterations for the first snooze. Clamped to at least 1.
    pub initial_spins: u32,
    /// Upper bound on spin iterations for a single snooze.
    pub max_spins: u32,
    /// Number of spinning snoozes before every further snooze yields
    /// instead. `u32::MAX` never yields.
    pub yield_after: u32,
    /// Randomly shorten each spin round by up to half.
    pub jitter: bool,
}

impl BackoffConfig {
    /// Pure busy-waiting, never yields the thread.
    pub const SPIN_ONLY: Self = Self {
        initial_spins: 1,
        max_spins: 1 << 10,
        yield_after: u32::MAX,
        jitter: true,
    };

    /// Spins briefly, then yields. Suited to waits that may be long.
    pub const SPIN_THEN_YIELD: Self = Self {
        initial_spins: 1,
        max_spins: 1 << 6,
        yield_after: 7,
        jitter: true,
    };

    fn normalized(mut self) -> Self {
        self.initial_spins = self.initial_spins.max(1);
        self.max_spins = self.max_spins.max(self.initial_spins);
        self
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::SPIN_THEN_YIELD
    }
}

/// Exponential backoff with a cap and optional jitter.
#[derive(Debug, Clone)]
pub struct Backoff<R: Relax = CpuRelax> {
    config: BackoffConfig,
    relax: R,
    current: u32,
    step: u32,
    rng: Option<DetRng>,
}

impl Backoff {
    /// Creates a backoff with the default spin-then-yield schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Creates a backoff with the given schedule.
    #[must_use]
    pub fn with_config(config: BackoffConfig) -> Self {
        Self::with_relax(config, CpuRelax)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Relax> Backoff<R> {
    /// Creates a backoff driving a custom pause primitive.
    pub fn with_relax(config: BackoffConfig, relax: R) -> Self {
        let config = config.normalized();
        Self {
            rng: config.jitter.then(DetRng::from_thread),
            current: config.initial_spins,
            step: 0,
            config,
            relax,
        }
    }

    /// Waits once, then grows the next wait.
    pub fn snooze(&mut self) {
        if self.is_yielding() {
            self.relax.yield_now();
            self.step = self.step.saturating_add(1);
            return;
        }

        let spins = match self.rng.as_mut() {
            Some(rng) => self.current - rng.next_at_most(self.current / 2),
            None => self.current,
        };
        self.relax.spin(spins);
        self.current = self.current.saturating_mul(2).min(self.config.max_spins);
        self.step = self.step.saturating_add(1);
    }

    /// Returns to the initial step.
    pub fn reset(&mut self) {
        self.current = self.config.initial_spins;
        self.step = 0;
    }

    /// True once the spin phase is exhausted and snoozes yield.
    #[must_use]
    pub fn is_yielding(&self) -> bool {
        // `step` saturates at `u32::MAX`, which must not count as reaching it.
        self.config.yield_after != u32::MAX && self.step >= self.config.yield_after
    }

    /// Number of snoozes since creation or the last [`reset`](Self::reset).
    #[must_use]
    pub fn steps(&self) -> u32 {
        self.step
    }

    /// The pause primitive.
    pub fn relax(&self) -> &R {
        &self.relax
    }
}
