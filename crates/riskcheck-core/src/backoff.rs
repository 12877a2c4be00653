//! Exponential backoff schedule for upstream retries.

use std::time::Duration;

/// Retry backoff policy: exponential delay with a cap and optional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling applied to every computed delay.
    pub max_delay: Duration,
    /// Multiplicative factor per retry.
    pub multiplier: f64,
    /// Retries after the initial attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Apply +/- 50% random jitter to each delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::upstream_default()
    }
}

impl BackoffPolicy {
    /// The stock policy for slow-changing upstreams: 5 retries starting at
    /// 2 s and doubling, capped at 60 s.
    pub fn upstream_default() -> Self {
        Self {
            initial_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: 5,
            jitter: true,
        }
    }

    pub fn no_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// The un-jittered delay for a 0-based retry attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let scale = self.multiplier.powi(attempt as i32);
        let seconds = self.initial_delay.as_secs_f64() * scale;
        Duration::from_secs_f64(seconds.min(self.max_delay.as_secs_f64()))
    }

    /// The delay for a 0-based retry attempt, jittered when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter {
            return base;
        }

        let jitter_ms = (base.as_millis() as f64 * 0.5) as u64;
        if jitter_ms == 0 {
            return base;
        }
        let offset = fastrand::u64(0..=(jitter_ms * 2));
        let total_ms = base.as_millis() as i64 + (offset as i64 - jitter_ms as i64);
        Duration::from_millis(total_ms.max(0) as u64)
    }

    /// Delay to suggest to callers once retries are exhausted: the next step
    /// in the schedule, un-jittered for reproducibility.
    pub fn suggested_delay(&self) -> Duration {
        self.base_delay(self.max_retries)
    }
}
