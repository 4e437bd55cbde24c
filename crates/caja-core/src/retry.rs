//! # Submission Retry Schedule
//!
//! How long a failed SUNAT submission waits before the next attempt.
//!
//! ```text
//! attempt:   1     2     3      4      5      6 ...
//! wait:     30s   60s   2m     4m     8m   ... capped at 1h
//!
//! attempts ≥ max_attempts  ──►  FALLIDO (no more retries)
//! ```
//!
//! Randomization is off: the same attempt count always yields the same wait.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};

/// Default number of attempts before an entry is marked `FALLIDO`.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 5;

/// Exponential schedule parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(60 * 60),
            multiplier: 2.0,
        }
    }
}

/// What to do with an entry whose latest attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Try again at the given time.
    RetryAt(DateTime<Utc>),
    /// Out of attempts.
    GiveUp,
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Wait before the next try, given how many attempts have failed so far.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let mut backoff = self.backoff();
        let mut delay = self.initial_interval;
        for _ in 0..failed_attempts.max(1) {
            delay = backoff.next_backoff().unwrap_or(self.max_interval);
        }
        delay
    }

    /// Decides the fate of an entry after a failure.
    ///
    /// `attempts` already includes the failure being recorded.
    pub fn after_failure(
        &self,
        attempts: i64,
        max_attempts: i64,
        now: DateTime<Utc>,
    ) -> FailureOutcome {
        if attempts >= max_attempts {
            return FailureOutcome::GiveUp;
        }

        let failed = u32::try_from(attempts.max(1)).unwrap_or(u32::MAX);
        let delay = chrono::Duration::from_std(self.delay_for(failed))
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        FailureOutcome::RetryAt(now + delay)
    }
}
