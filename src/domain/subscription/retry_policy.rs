//! Retry and grace-period policy for failed renewals.

use chrono::Duration;

use crate::domain::billing::FailureClass;
use crate::domain::foundation::{Timestamp, ValidationError};

/// Decides when a failed renewal is retried and how long the grace period lasts.
pub trait RetryPolicy: Send + Sync {
    /// When to retry after the `failure_count`-th consecutive failure.
    ///
    /// `None` means no automatic retry. Any returned time is strictly after `now`.
    fn next_retry_at(&self, failure_count: u32, class: FailureClass, now: Timestamp) -> Option<Timestamp>;

    /// Length of the grace window started by the first failure.
    fn grace_period(&self) -> Duration;

    /// Consecutive failures after which automatic retries stop.
    fn max_attempts(&self) -> u32;

    /// Returns true if a subscription with this many failures may still be retried.
    fn within_budget(&self, failure_count: u32) -> bool {
        failure_count > 0 && failure_count <= self.max_attempts()
    }
}

/// Stepped backoff: the n-th failure waits `delays[n - 1]`, reusing the last
/// delay once the list runs out, until `max_attempts` failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffRetryPolicy {
    delays: Vec<Duration>,
    max_attempts: u32,
    grace_period: Duration,
}

impl BackoffRetryPolicy {
    pub const DEFAULT_DELAY_HOURS: [i64; 3] = [1, 4, 12];
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_GRACE_DAYS: i64 = 7;

    pub fn new(delays: Vec<Duration>, max_attempts: u32, grace_period: Duration) -> Result<Self, ValidationError> {
        if delays.is_empty() {
            return Err(ValidationError::empty_field("retry_delays"));
        }
        if delays.iter().any(|d| *d <= Duration::zero()) {
            return Err(ValidationError::invalid_format(
                "retry_delays",
                "every delay must be positive",
            ));
        }
        if grace_period <= Duration::zero() {
            return Err(ValidationError::invalid_format(
                "grace_period",
                "grace period must be positive",
            ));
        }
        Ok(Self {
            delays,
            max_attempts,
            grace_period,
        })
    }

    /// Builds a policy from whole hours and days, as configured.
    pub fn from_hours(delay_hours: &[i64], max_attempts: u32, grace_days: i64) -> Result<Self, ValidationError> {
        Self::new(
            delay_hours.iter().map(|h| Duration::hours(*h)).collect(),
            max_attempts,
            Duration::days(grace_days),
        )
    }
}

impl Default for BackoffRetryPolicy {
    fn default() -> Self {
        Self {
            delays: Self::DEFAULT_DELAY_HOURS
                .iter()
                .map(|h| Duration::hours(*h))
                .collect(),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            grace_period: Duration::days(Self::DEFAULT_GRACE_DAYS),
        }
    }
}

impl RetryPolicy for BackoffRetryPolicy {
    fn next_retry_at(&self, failure_count: u32, class: FailureClass, now: Timestamp) -> Option<Timestamp> {
        if !class.is_retryable() || !self.within_budget(failure_count) {
            return None;
        }
        let index = (failure_count as usize - 1).min(self.delays.len() - 1);
        Some(now.plus(self.delays[index]))
    }

    fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
