//! Exponential backoff with full jitter.
//!
//! Delay computation used by the token-bucket strategy between attempts. The
//! ceiling doubles per retry (`base * 2^attempt`, attempt `0` = first retry)
//! and the actual delay is drawn uniformly from `[0, ceiling]`, capped at
//! [`MAX_RETRY_DELAY`]. Computations that would overflow saturate at the cap.
//!
//! RNG: `rand`'s thread-local RNG by default; deterministic RNGs can be
//! injected via [`ExponentialBackoff::delay_with_rng`].

use rand::{rng, Rng};
use std::time::Duration;

/// Hard ceiling applied to every computed delay (20 seconds).
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(20);

/// Delay base for ordinary retryable failures.
pub const DEFAULT_DELAY_BASE: Duration = Duration::from_millis(100);

/// Delay base once the server signalled throttling.
pub const THROTTLING_DELAY_BASE: Duration = Duration::from_millis(500);

/// Exponential backoff curve with a hard cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_BASE)
    }
}

impl ExponentialBackoff {
    /// Curve starting at `base`, capped at [`MAX_RETRY_DELAY`].
    pub fn new(base: Duration) -> Self {
        Self { base, cap: MAX_RETRY_DELAY }
    }

    /// Replace the cap. The ceiling never exceeds it, jittered or not.
    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Upper bound for a given retry ordinal (0 = first retry), before jitter.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let multiplier = 2u128.saturating_pow(attempt);
        let nanos = self.base.as_nanos().saturating_mul(multiplier);
        let capped = nanos.min(self.cap.as_nanos()).min(u64::MAX as u128);
        Duration::from_nanos(capped as u64)
    }

    /// Randomized delay in `[0, ceiling]` for the given retry ordinal.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rng())
    }

    /// Randomized delay with a caller-supplied RNG (for deterministic tests).
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling_millis: u64 = self.ceiling(attempt).as_millis().try_into().unwrap_or(u64::MAX);
        if ceiling_millis == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.random_range(0..=ceiling_millis))
    }
}
