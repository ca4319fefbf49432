//! Deterministic pseudo-random number generator.
//!
//! Backoff jitter only needs a cheap, seedable source of spread so that
//! contending threads do not retry in lock-step. Seeding from a per-thread
//! value keeps runs reproducible in tests.

/// A deterministic pseudo-random number generator using xorshift64.
///
/// Not cryptographically secure.
#[derive(Debug, Clone)]
pub struct DetRng {
    state: u64,
}

impl DetRng {
    /// Creates a new PRNG with the given seed.
    ///
    /// A zero seed is replaced with 1 (xorshift has a fixed point at zero).
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Creates a PRNG seeded from the address of a stack slot of the
    /// calling thread, so concurrent threads diverge.
    #[must_use]
    pub fn from_thread() -> Self {
        let slot = 0u8;
        let addr = std::ptr::addr_of!(slot) as usize as u64;
        Self::new(addr.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15)
    }

    /// Generates the next pseudo-random u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Returns a value in `[0, bound]` (inclusive). `bound == 0` yields 0.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn next_at_most(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % (u64::from(bound) + 1)) as u32
    }
}
