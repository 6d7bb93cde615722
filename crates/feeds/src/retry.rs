//! Bounded retry policy for rate requests.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with an attempt cap.
///
/// Retry `n` waits `base * 2^(n-1)`, capped at `ceiling`, plus up to 25%
/// jitter unless disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    ceiling: Duration,
    retries: u32,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(base: Duration, ceiling: Duration, retries: u32) -> Self {
        Self {
            base,
            ceiling,
            retries,
            jitter: true,
        }
    }

    /// A policy that never retries.
    pub fn never() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0).without_jitter()
    }

    /// Deterministic delays.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before retry `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        let delay = self
            .base
            .checked_mul(1 << doublings)
            .map_or(self.ceiling, |d| d.min(self.ceiling));

        if !self.jitter || delay.is_zero() {
            return delay;
        }
        delay.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..0.25))
    }

    /// Whether retry number `attempt` (1-based) is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(10), 3)
    }
}
