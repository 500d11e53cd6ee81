//! Errors raised while loading or checking `AppConfig`

use thiserror::Error;

/// Startup failure: the environment could not be read or did not validate.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration rejected: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A loaded value outside what the engine accepts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing RENEWAL_ENGINE__{0}")]
    MissingRequired(&'static str),

    #[error("Database URL must use the postgres:// or postgresql:// scheme")]
    InvalidDatabaseUrl,

    #[error("Pool needs 1 <= min_connections <= max_connections")]
    InvalidPoolSize,

    #[error("Pool max_connections is capped at 100")]
    PoolSizeTooLarge,

    #[error("Stripe API key must start with sk_")]
    InvalidStripeKey,

    #[error("Gateway timeout must be between 1 and 120 seconds")]
    InvalidGatewayTimeout,

    #[error("Invalid retry delays: {0}")]
    InvalidRetryDelays(String),

    #[error("Grace period must be at least one day")]
    InvalidGracePeriod,

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Runner poll interval must be at least one second")]
    InvalidPollInterval,

    #[error("Runner concurrency must be between 1 and 64")]
    InvalidConcurrency,

    #[error("Runner claim timeout must be between 60 seconds and one day")]
    InvalidClaimTimeout,
}
