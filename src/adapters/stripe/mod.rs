//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Stripe, plus a mock gateway with
//! the same idempotency behaviour for tests and dry runs.
//!
//! # Security
//!
//! - The API key is held as a `secrecy::SecretString`
//!
//! # Configuration
//!
//! - `RENEWAL_ENGINE__PAYMENT__STRIPE_API_KEY`: Stripe secret API key

mod mock_gateway;
mod stripe_gateway;
mod types;

pub use mock_gateway::{MockPaymentGateway, ScriptedOutcome};
pub use stripe_gateway::{StripeGateway, StripeGatewayConfig};
pub use types::{
    StripeCustomer, StripeErrorBody, StripeErrorResponse, StripePaymentIntent,
    StripePaymentMethod, StripePaymentMethodList,
};
