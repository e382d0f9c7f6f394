//! Reusable retry policy: exponential backoff with jitter.

use std::time::Duration;

use rand::RngExt;

/// Parameters for the bounded upload retry loop.
///
/// The delay after the n-th failed attempt is
/// `base_delay * 2^(n-1) + U(0, max_jitter)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, counting the first one.
    pub max_attempts: u32,
    /// Backoff base.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(5),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// The delay to wait after `attempt` (1-indexed) has failed.
    ///
    /// The exponential term saturates instead of overflowing, so a
    /// misconfigured attempt count cannot panic here.
    pub fn delay_after<R: RngExt>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        let backoff = self
            .base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX);

        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.random_range(0..jitter_ms))
        };

        backoff.saturating_add(jitter)
    }
}
