//! Exponential backoff with bounded jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy shared by step retry and notification delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Returns the delay before retry number `attempt` (1-indexed).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        retry_delay(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}

/// Returns the backoff delay for retry `attempt` (1-indexed).
///
/// The delay is `base * 2^(attempt-1)` with a uniform jitter factor in
/// `[0.75, 1.25]`, capped at `max_delay_ms` before jitter is applied.
#[must_use]
pub fn retry_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let attempt = attempt.max(1);
    let exp = base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt - 1))
        .min(max_delay_ms);

    let jitter: f64 = rand::thread_rng().gen_range(0.75..=1.25);
    let millis = (exp as f64 * jitter).round() as u64;

    Duration::from_millis(millis)
}
