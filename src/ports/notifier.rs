//! Customer notification port.
//!
//! Fire-and-forget from the engine's point of view: a failed notification
//! is logged and never rolls back committed billing state.

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::Subscription;
use async_trait::async_trait;
use serde::Serialize;

/// What the customer is told after a successful renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalNotice {
    pub transaction_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub next_billing_at: chrono::NaiveDate,
}

/// Retry schedule shown to the customer after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryInfo {
    pub retry_at: Option<Timestamp>,
    pub grace_ends_at: Option<Timestamp>,
    pub failed_attempts: u32,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_renewed(&self, subscription: &Subscription, notice: &RenewalNotice) -> Result<(), DomainError>;

    /// `customer_message` is the mapped message; raw gateway text never reaches here.
    async fn notify_failed(
        &self,
        subscription: &Subscription,
        customer_message: &str,
        retry: Option<&RetryInfo>,
    ) -> Result<(), DomainError>;

    async fn notify_cancelled(&self, subscription: &Subscription, reason: &str) -> Result<(), DomainError>;
}
