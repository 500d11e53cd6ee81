//! Renewal runner configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MIN_CLAIM_TIMEOUT_SECS: u64 = 60;
const MAX_CLAIM_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Seconds between passes over the due queue
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Renewals processed concurrently within one pass
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Cancel subscriptions whose grace period has lapsed at the end of each pass
    #[serde(default = "default_cancel_lapsed")]
    pub cancel_lapsed: bool,

    /// Seconds after which an unfinished claim is considered abandoned and
    /// its action returned to the pending set
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,
}

impl RunnerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_secs == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.max_concurrent == 0 || self.max_concurrent > 64 {
            return Err(ValidationError::InvalidConcurrency);
        }
        if !(MIN_CLAIM_TIMEOUT_SECS..=MAX_CLAIM_TIMEOUT_SECS).contains(&self.claim_timeout_secs) {
            return Err(ValidationError::InvalidClaimTimeout);
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_concurrent: default_max_concurrent(),
            cancel_lapsed: default_cancel_lapsed(),
            claim_timeout_secs: default_claim_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    4
}

fn default_cancel_lapsed() -> bool {
    true
}

fn default_claim_timeout() -> u64 {
    900
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunnerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert!(config.cancel_lapsed);
        assert_eq!(config.claim_timeout(), Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let idle = RunnerConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(idle.validate(), Err(ValidationError::InvalidPollInterval));

        let stalled = RunnerConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert_eq!(stalled.validate(), Err(ValidationError::InvalidConcurrency));
    }

    #[test]
    fn claim_timeout_is_bounded() {
        for secs in [0, 59, 86_401] {
            let config = RunnerConfig {
                claim_timeout_secs: secs,
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(ValidationError::InvalidClaimTimeout));
        }
    }
}
