//! Billing policy configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::application::DEFAULT_PAYMENT_HOOK;
use crate::domain::foundation::Currency;
use crate::domain::subscription::BackoffRetryPolicy;

/// Retry, grace and queue settings for renewals.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: i64,

    /// Automatic retries stop after this many consecutive failures
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Comma-separated hours between retries, e.g. "1,4,12"
    #[serde(default = "default_retry_delay_hours")]
    pub retry_delay_hours: String,

    /// Hook name of renewal rows in the legacy action queue
    #[serde(default = "default_action_hook")]
    pub action_hook: String,

    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl BillingConfig {
    /// Parses the configured retry delays.
    pub fn retry_delays(&self) -> Result<Vec<i64>, ValidationError> {
        let delays = self
            .retry_delay_hours
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| ValidationError::InvalidRetryDelays(format!("'{}' is not a number", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if delays.is_empty() {
            return Err(ValidationError::InvalidRetryDelays("no delays given".to_string()));
        }
        if delays.iter().any(|h| *h <= 0) {
            return Err(ValidationError::InvalidRetryDelays(
                "delays must be positive".to_string(),
            ));
        }
        Ok(delays)
    }

    pub fn currency(&self) -> Result<Currency, ValidationError> {
        Currency::new(&self.default_currency)
            .map_err(|_| ValidationError::InvalidCurrency(self.default_currency.clone()))
    }

    /// Builds the retry policy the renewal handler uses.
    pub fn retry_policy(&self) -> Result<BackoffRetryPolicy, ValidationError> {
        let delays = self.retry_delays()?;
        BackoffRetryPolicy::from_hours(&delays, self.max_retry_attempts, self.grace_period_days)
            .map_err(|e| ValidationError::InvalidRetryDelays(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.grace_period_days < 1 {
            return Err(ValidationError::InvalidGracePeriod);
        }
        if self.action_hook.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__ACTION_HOOK"));
        }
        self.currency()?;
        self.retry_policy()?;
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            grace_period_days: default_grace_period_days(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_hours: default_retry_delay_hours(),
            action_hook: default_action_hook(),
            default_currency: default_currency(),
        }
    }
}

fn default_grace_period_days() -> i64 {
    BackoffRetryPolicy::DEFAULT_GRACE_DAYS
}

fn default_max_retry_attempts() -> u32 {
    BackoffRetryPolicy::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_hours() -> String {
    "1,4,12".to_string()
}

fn default_action_hook() -> String {
    DEFAULT_PAYMENT_HOOK.to_string()
}

fn default_currency() -> String {
    "GBP".to_string()
}
