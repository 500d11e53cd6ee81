//! Payment gateway configuration

use serde::Deserialize;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::error::ValidationError;

/// Card gateway configuration (Stripe).
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Secret API key (sk_live_... or sk_test_...)
    pub stripe_api_key: SecretString,

    /// Upper bound on a single gateway call, in seconds
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Override for the Stripe API host (stripe-mock, recorded fixtures)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl PaymentConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let key = self.stripe_api_key.expose_secret();
        if key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        // Publishable and restricted keys cannot create PaymentIntents.
        if !key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if self.gateway_timeout_secs == 0 || self.gateway_timeout_secs > 120 {
            return Err(ValidationError::InvalidGatewayTimeout);
        }
        Ok(())
    }
}

fn default_gateway_timeout() -> u64 {
    30
}
