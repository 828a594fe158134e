//! Reconnect schedule for the observer client.
//!
//! Attempt `k` (1-indexed) waits `base_delay * 2^(k-1)`: 1s, 2s, 4s, 8s,
//! 16s with the defaults. There is no jitter and no cap other than the
//! attempt ceiling, so the longest total wait before giving up is
//! `base_delay * (2^max_attempts - 1)`.

use std::time::Duration;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Retries allowed after a loss before the client gives up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-indexed). Attempt 0 has no delay.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let Some(exponent) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 2_u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Sum of every delay in the schedule.
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        (1..=self.max_attempts)
            .map(|k| self.delay_for(k))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

/// Retry counter driven by [`ReconnectPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    /// Attempts consumed since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Consumes one attempt and returns `(attempt, delay)`, or `None` once
    /// the budget is spent.
    pub fn next_retry(&mut self, policy: &ReconnectPolicy) -> Option<(u32, Duration)> {
        if self.attempts >= policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, policy.delay_for(self.attempts)))
    }

    /// Returns `true` if no retries remain.
    #[must_use]
    pub fn is_exhausted(&self, policy: &ReconnectPolicy) -> bool {
        self.attempts >= policy.max_attempts
    }

    /// Restores the full retry budget.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
