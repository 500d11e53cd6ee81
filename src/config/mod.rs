//! Engine configuration
//!
//! Read from the environment (and an optional `.env`) through the `config`
//! and `dotenvy` crates. Variables use the `RENEWAL_ENGINE` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use renewal_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("environment is readable");
//! config.validate().expect("settings are in range");
//!
//! println!("Polling every {:?}", config.runner.poll_interval());
//! ```

mod billing;
mod database;
mod error;
mod payment;
mod runner;
mod runtime;

pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use runner::RunnerConfig;
pub use runtime::{Environment, RuntimeConfig};

use serde::Deserialize;

/// Every setting the binary needs, one struct per section.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment name and log filter
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// PostgreSQL connection pool
    pub database: DatabaseConfig,

    /// Card gateway (Stripe)
    pub payment: PaymentConfig,

    /// Retry, grace period and action queue settings
    #[serde(default)]
    pub billing: BillingConfig,

    /// Periodic renewal driver
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl AppConfig {
    /// Reads the environment.
    ///
    /// Loads `.env` if present, then reads `RENEWAL_ENGINE__*` variables:
    ///
    /// - `RENEWAL_ENGINE__DATABASE__URL=...` -> `database.url`
    /// - `RENEWAL_ENGINE__BILLING__GRACE_PERIOD_DAYS=7` -> `billing.grace_period_days`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("RENEWAL_ENGINE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Range-checks each section in turn.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, section by section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.payment.validate()?;
        self.billing.validate()?;
        self.runner.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.runtime.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Environment variables are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "RENEWAL_ENGINE__DATABASE__URL",
        "RENEWAL_ENGINE__PAYMENT__STRIPE_API_KEY",
        "RENEWAL_ENGINE__RUNTIME__ENVIRONMENT",
        "RENEWAL_ENGINE__BILLING__GRACE_PERIOD_DAYS",
        "RENEWAL_ENGINE__BILLING__RETRY_DELAY_HOURS",
        "RENEWAL_ENGINE__RUNNER__MAX_CONCURRENT",
    ];

    fn set_minimal_env() {
        env::set_var("RENEWAL_ENGINE__DATABASE__URL", "postgresql://billing@localhost/farm");
        env::set_var("RENEWAL_ENGINE__PAYMENT__STRIPE_API_KEY", "sk_test_xxx");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn loads_minimal_environment_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://billing@localhost/farm");
        assert_eq!(config.payment.stripe_api_key.expose_secret(), "sk_test_xxx");
        assert_eq!(config.billing.grace_period_days, 7);
        assert_eq!(config.billing.max_retry_attempts, 3);
        assert_eq!(config.runner.max_concurrent, 4);
        assert_eq!(config.runtime.environment, Environment::Development);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_overrides_are_read() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("RENEWAL_ENGINE__RUNTIME__ENVIRONMENT", "production");
        env::set_var("RENEWAL_ENGINE__BILLING__GRACE_PERIOD_DAYS", "14");
        env::set_var("RENEWAL_ENGINE__BILLING__RETRY_DELAY_HOURS", "2,8");
        env::set_var("RENEWAL_ENGINE__RUNNER__MAX_CONCURRENT", "8");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert!(config.is_production());
        assert_eq!(config.billing.grace_period_days, 14);
        assert_eq!(config.billing.retry_delays().unwrap(), vec![2, 8]);
        assert_eq!(config.runner.max_concurrent, 8);
    }

    #[test]
    fn missing_database_section_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("RENEWAL_ENGINE__PAYMENT__STRIPE_API_KEY", "sk_test_xxx");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }
}
