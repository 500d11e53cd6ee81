//! Payment gateway port.
//!
//! Defines the contract for the card gateway (e.g. Stripe). The gateway
//! deduplicates charges by idempotency key; the engine relies on that as
//! its only protection against double charging.
//!
//! # Design
//!
//! - **Off-session**: charges run with no customer present and auto-confirm
//! - **Idempotent**: the same key always yields the same charge
//! - **Errors are data**: the payment processor turns every [`GatewayError`]
//!   into a failed charge result

use crate::domain::billing::IdempotencyKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create and confirm a charge.
    async fn create_charge(&self, request: ChargeRequest) -> Result<GatewayCharge, GatewayError>;

    /// Resolve the payment method to charge for a customer.
    ///
    /// `preferred` is the customer's explicitly marked default; it is used
    /// if it still exists at the gateway. Otherwise the most recently
    /// updated stored method is returned. `None` when the customer has no
    /// usable method.
    async fn resolve_default_method(
        &self,
        gateway_customer_id: &str,
        preferred: Option<&str>,
    ) -> Result<Option<PaymentMethodRef>, GatewayError>;
}

/// Request to charge a stored payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Amount in minor units, at least 1.
    pub amount_minor: i64,

    /// Lower-case ISO currency code.
    pub currency: String,

    pub customer_id: String,
    pub payment_method_id: String,
    pub idempotency_key: IdempotencyKey,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
}

/// Status reported by the gateway for a created charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayChargeStatus {
    Succeeded,

    /// Issuer requires customer authentication (3-D Secure).
    RequiresAction,

    /// Accepted, settlement still pending.
    Processing,

    /// The charge did not go through.
    Failed,
}

/// Charge as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub transaction_id: String,
    pub status: GatewayChargeStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl GatewayCharge {
    pub fn succeeded(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: GatewayChargeStatus::Succeeded,
            error_code: None,
            error_message: None,
        }
    }
}

/// A stored payment method at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodRef {
    pub id: String,
    pub is_default: bool,
    /// Unix seconds of the last update, used to pick the newest method.
    pub updated_at: i64,
}

/// Pick the method to charge from a customer's stored methods.
///
/// Order: the explicitly preferred id if still present, then a method the
/// gateway flags as default, then the most recently updated one.
pub fn select_default_method(
    preferred: Option<&str>,
    methods: Vec<PaymentMethodRef>,
) -> Option<PaymentMethodRef> {
    if let Some(wanted) = preferred {
        if let Some(found) = methods.iter().find(|m| m.id == wanted) {
            return Some(found.clone());
        }
    }
    if let Some(flagged) = methods.iter().find(|m| m.is_default) {
        return Some(flagged.clone());
    }
    methods.into_iter().max_by_key(|m| m.updated_at)
}

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
    /// Gateway's own code, e.g. a decline code (`insufficient_funds`).
    pub provider_code: Option<String>,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::CardDeclined, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider_code {
            Some(code) => write!(f, "{} ({}): {}", self.code, code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Gateway error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// No response within the deadline; the charge may have happened.
    Timeout,

    /// Connection failed.
    NetworkError,

    /// API key rejected.
    AuthenticationError,

    /// Card declined by the issuer.
    CardDeclined,

    /// Request rejected as malformed.
    InvalidRequest,

    RateLimitExceeded,

    /// Gateway-side failure.
    ProviderError,
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::CardDeclined => "card_declined",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(id: &str, is_default: bool, updated_at: i64) -> PaymentMethodRef {
        PaymentMethodRef {
            id: id.to_string(),
            is_default,
            updated_at,
        }
    }

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn preferred_method_wins_when_present() {
        let methods = vec![method("pm_a", true, 10), method("pm_b", false, 5)];
        let chosen = select_default_method(Some("pm_b"), methods).unwrap();
        assert_eq!(chosen.id, "pm_b");
    }

    #[test]
    fn stale_preferred_falls_back_to_flagged_then_newest() {
        let methods = vec![method("pm_a", false, 10), method("pm_b", true, 5)];
        assert_eq!(select_default_method(Some("pm_gone"), methods).unwrap().id, "pm_b");

        let methods = vec![method("pm_a", false, 10), method("pm_c", false, 30)];
        assert_eq!(select_default_method(Some("pm_gone"), methods).unwrap().id, "pm_c");
    }

    #[test]
    fn no_methods_resolves_to_none() {
        assert!(select_default_method(Some("pm_a"), vec![]).is_none());
    }

    #[test]
    fn error_display_includes_provider_code() {
        let err = GatewayError::card_declined("Your card was declined.")
            .with_provider_code("insufficient_funds");
        assert_eq!(
            err.to_string(),
            "card_declined (insufficient_funds): Your card was declined."
        );
    }
}
