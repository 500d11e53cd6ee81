//! Charge attempt outcomes.
//!
//! A charge attempt always produces a [`ChargeResult`]. Payment failure is
//! an expected outcome and is carried as a value, not an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Money, SubscriptionId, Timestamp};

use super::IdempotencyKey;

/// No stored payment method could be resolved for the customer.
pub const NO_PAYMENT_METHOD: &str = "NO_PAYMENT_METHOD";

/// The gateway did not answer within the configured timeout.
pub const GATEWAY_TIMEOUT: &str = "GATEWAY_TIMEOUT";

/// The gateway failed for a reason unrelated to the card.
pub const GATEWAY_ERROR: &str = "GATEWAY_ERROR";

/// The gateway accepted the charge but has not settled it yet.
pub const GATEWAY_PENDING: &str = "GATEWAY_PENDING";

/// The card issuer asked for customer authentication.
pub const AUTHENTICATION_REQUIRED: &str = "authentication_required";

/// Generic decline used when the gateway reports failure without a code.
pub const CARD_DECLINED: &str = "card_declined";

pub const NO_PAYMENT_METHOD_MESSAGE: &str =
    "We don't have a payment method on file. Please add a card to your account.";

/// How a failed attempt should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Cannot succeed without customer action; no automatic retry.
    Terminal,

    /// The issuer declined the card.
    Declined,

    /// Outcome unknown (timeout or still processing); the charge may have
    /// gone through, retries reuse the same idempotency key.
    Ambiguous,

    /// The gateway itself failed.
    Transient,
}

impl FailureClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureClass::Terminal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Terminal => "terminal",
            FailureClass::Declined => "declined",
            FailureClass::Ambiguous => "ambiguous",
            FailureClass::Transient => "transient",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic detail of a failed attempt. Never shown to customers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeFailure {
    pub class: FailureClass,
    pub code: String,
    pub technical_message: String,
}

impl ChargeFailure {
    pub fn new(class: FailureClass, code: impl Into<String>, technical_message: impl Into<String>) -> Self {
        Self {
            class,
            code: code.into(),
            technical_message: technical_message.into(),
        }
    }

    pub fn no_payment_method(technical_message: impl Into<String>) -> Self {
        Self::new(FailureClass::Terminal, NO_PAYMENT_METHOD, technical_message)
    }

    pub fn timeout(technical_message: impl Into<String>) -> Self {
        Self::new(FailureClass::Ambiguous, GATEWAY_TIMEOUT, technical_message)
    }

    pub fn gateway(technical_message: impl Into<String>) -> Self {
        Self::new(FailureClass::Transient, GATEWAY_ERROR, technical_message)
    }
}

/// Where the charge was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeChannel {
    /// Collected through the card gateway.
    Card,

    /// Collected by the legacy commerce system; recorded here only.
    Legacy,
}

impl ChargeChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeChannel::Card => "card",
            ChargeChannel::Legacy => "legacy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Failed,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Succeeded => "succeeded",
            ChargeStatus::Failed => "failed",
        }
    }
}

/// Immutable record of one charge attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRecord {
    pub subscription_id: SubscriptionId,
    pub idempotency_key: IdempotencyKey,
    pub transaction_id: Option<String>,
    pub amount: Money,
    pub status: ChargeStatus,
    pub error_code: Option<String>,
    pub channel: ChargeChannel,
    pub created_at: Timestamp,
}

/// Outcome of one charge attempt, returned to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeResult {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub failure: Option<ChargeFailure>,
    /// Mapped, customer-safe message. Present only on failure.
    pub customer_message: Option<String>,
    pub record: ChargeRecord,
}

impl ChargeResult {
    /// Builds a successful result.
    pub fn succeeded(record: ChargeRecord) -> Self {
        Self {
            success: true,
            transaction_id: record.transaction_id.clone(),
            failure: None,
            customer_message: None,
            record,
        }
    }

    /// Builds a failed result.
    pub fn failed(failure: ChargeFailure, customer_message: impl Into<String>, record: ChargeRecord) -> Self {
        Self {
            success: false,
            transaction_id: record.transaction_id.clone(),
            failure: Some(failure),
            customer_message: Some(customer_message.into()),
            record,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.code.as_str())
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        self.failure.as_ref().map(|f| f.class)
    }
}
