//! CancelLapsedSubscriptionsHandler - the explicit grace-expiry decision.
//!
//! A renewal attempt never cancels inline. Subscriptions still on hold once
//! their grace period has ended are cancelled here, as a separately audited
//! `grace_period_expired` event.

use std::sync::Arc;

use serde_json::json;

use crate::application::Scheduler;
use crate::domain::audit::{AuditAction, AuditContext, AuditEntry};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError, GRACE_EXPIRED_REASON};
use crate::ports::{Notifier, SubscriptionRepository};

#[derive(Debug, Clone, Default)]
pub struct CancelLapsedSubscriptionsCommand {
    pub context: AuditContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelLapsedSubscriptionsResult {
    pub cancelled: Vec<SubscriptionId>,
    /// Lapsed subscriptions that could not be cancelled for a non-fatal reason.
    pub skipped: Vec<SubscriptionId>,
}

pub struct CancelLapsedSubscriptionsHandler {
    repository: Arc<dyn SubscriptionRepository>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
}

impl CancelLapsedSubscriptionsHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            scheduler,
            notifier,
        }
    }

    /// Cancels every lapsed subscription. Stops at the first fatal error.
    pub async fn handle(
        &self,
        cmd: CancelLapsedSubscriptionsCommand,
    ) -> Result<CancelLapsedSubscriptionsResult, SubscriptionError> {
        let now = Timestamp::now();
        let lapsed = self.repository.find_grace_lapsed(now).await?;
        let mut result = CancelLapsedSubscriptionsResult::default();

        for subscription in lapsed {
            let id = subscription.id;
            match self.cancel_one(subscription, &cmd.context, now).await {
                Ok(()) => result.cancelled.push(id),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(subscription_id = %id, error = %e, "Skipping lapsed subscription");
                    result.skipped.push(id);
                }
            }
        }

        if !result.cancelled.is_empty() {
            tracing::info!(
                cancelled = result.cancelled.len(),
                skipped = result.skipped.len(),
                "Cancelled subscriptions with expired grace periods"
            );
        }
        Ok(result)
    }

    async fn cancel_one(
        &self,
        mut subscription: Subscription,
        context: &AuditContext,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if !subscription.is_grace_lapsed(now) {
            return Err(SubscriptionError::invalid_state(
                subscription.status,
                "expire grace period of",
            ));
        }
        let before = subscription.snapshot();
        let grace_ended = subscription.grace_period_ends_at;
        let failures = subscription.failed_payment_count;

        subscription.cancel(Some(GRACE_EXPIRED_REASON.to_string()), now)?;

        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::GracePeriodExpired,
            context,
            format!("Cancelled after {} failed payments: {}", failures, GRACE_EXPIRED_REASON),
            now,
        )
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({
            "grace_period_ends_at": grace_ended,
            "failed_payment_count": failures,
        }));
        self.repository.commit(&subscription, &entry).await?;
        self.scheduler.unschedule(subscription.id).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            failed_payment_count = failures,
            "Grace period expired, subscription cancelled"
        );

        if let Err(e) = self
            .notifier
            .notify_cancelled(&subscription, GRACE_EXPIRED_REASON)
            .await
        {
            tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to send cancellation notification"
            );
        }
        Ok(())
    }
}
