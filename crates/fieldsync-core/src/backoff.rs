// ABOUTME: Exponential backoff policy applied before each sync attempt.
// ABOUTME: Delay doubles per consecutive failure from a base, clamped to a cap.

use std::time::Duration;

/// Backoff applied before a sync attempt, keyed by the number of consecutive
/// failures so far. Defaults to 1s base doubling to a 10s cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            cap: Duration::from_millis(10_000),
        }
    }
}

impl BackoffPolicy {
    /// `min(base * 2^attempts, cap)`. Saturates instead of overflowing for
    /// large attempt counts.
    pub fn delay(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |d| d.min(self.cap))
    }
}

/// Delay for the default policy.
pub fn backoff_delay(attempts: u32) -> Duration {
    BackoffPolicy::default().delay(attempts)
}
