//! Notifier that emits customer notifications as structured log events.
//!
//! Delivery over SMS or email is handled downstream by whatever consumes
//! the `customer_notification` target.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::subscription::Subscription;
use crate::ports::{Notifier, RenewalNotice, RetryInfo};

const TARGET: &str = "customer_notification";

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_renewed(&self, subscription: &Subscription, notice: &RenewalNotice) -> Result<(), DomainError> {
        tracing::info!(
            target: TARGET,
            kind = "renewed",
            subscription_id = %subscription.id,
            amount_minor = notice.amount_minor,
            currency = %notice.currency,
            transaction_id = ?notice.transaction_id,
            next_billing_at = %notice.next_billing_at,
            "Subscription renewed"
        );
        Ok(())
    }

    async fn notify_failed(
        &self,
        subscription: &Subscription,
        customer_message: &str,
        retry: Option<&RetryInfo>,
    ) -> Result<(), DomainError> {
        tracing::info!(
            target: TARGET,
            kind = "payment_failed",
            subscription_id = %subscription.id,
            customer_message,
            failed_attempts = retry.map(|r| r.failed_attempts),
            retry_at = ?retry.and_then(|r| r.retry_at),
            grace_ends_at = ?retry.and_then(|r| r.grace_ends_at),
            "Renewal payment failed"
        );
        Ok(())
    }

    async fn notify_cancelled(&self, subscription: &Subscription, reason: &str) -> Result<(), DomainError> {
        tracing::info!(
            target: TARGET,
            kind = "cancelled",
            subscription_id = %subscription.id,
            reason,
            "Subscription cancelled"
        );
        Ok(())
    }
}
