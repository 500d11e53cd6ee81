//! Stripe API response types.
//!
//! Only the fields the renewal engine reads are modelled.

use serde::Deserialize;

use crate::ports::{GatewayChargeStatus, GatewayError, GatewayErrorCode};

/// A PaymentIntent as returned by `POST /v1/payment_intents`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    /// Unique identifier (pi_...).
    pub id: String,

    /// `succeeded`, `requires_action`, `processing`, `requires_payment_method`, ...
    pub status: String,

    #[serde(default)]
    pub last_payment_error: Option<StripeErrorBody>,
}

impl StripePaymentIntent {
    pub fn charge_status(&self) -> GatewayChargeStatus {
        match self.status.as_str() {
            "succeeded" => GatewayChargeStatus::Succeeded,
            "requires_action" | "requires_confirmation" => GatewayChargeStatus::RequiresAction,
            "processing" => GatewayChargeStatus::Processing,
            _ => GatewayChargeStatus::Failed,
        }
    }
}

/// Customer object; only invoice settings matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,

    #[serde(default)]
    pub deleted: bool,

    #[serde(default)]
    pub invoice_settings: Option<StripeInvoiceSettings>,
}

impl StripeCustomer {
    pub fn default_payment_method(&self) -> Option<&str> {
        self.invoice_settings
            .as_ref()
            .and_then(|s| s.default_payment_method.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSettings {
    #[serde(default)]
    pub default_payment_method: Option<String>,
}

/// `GET /v1/payment_methods` list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentMethodList {
    pub data: Vec<StripePaymentMethod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentMethod {
    /// Unique identifier (pm_...).
    pub id: String,

    /// Unix timestamp of creation.
    pub created: i64,
}

/// Error envelope: `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeErrorBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeErrorBody {
    /// `card_error`, `invalid_request_error`, `api_error`, ...
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    /// More specific than `code` for card declines.
    #[serde(default)]
    pub decline_code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

impl StripeErrorBody {
    /// Most specific code available.
    pub fn best_code(&self) -> Option<&str> {
        self.decline_code.as_deref().or(self.code.as_deref())
    }

    /// Converts an API error with the given HTTP status to a gateway error.
    pub fn into_gateway_error(self, status: u16) -> GatewayError {
        let code = match (status, self.error_type.as_deref()) {
            (_, Some("card_error")) | (402, _) => GatewayErrorCode::CardDeclined,
            (401, _) | (403, _) => GatewayErrorCode::AuthenticationError,
            (429, _) => GatewayErrorCode::RateLimitExceeded,
            (400, _) | (404, _) => GatewayErrorCode::InvalidRequest,
            _ => GatewayErrorCode::ProviderError,
        };
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status));
        let error = GatewayError::new(code, message);
        match self.best_code() {
            Some(provider_code) => error.with_provider_code(provider_code),
            None => error,
        }
    }
}
