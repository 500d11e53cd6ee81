//! CancelSubscriptionHandler - terminal cancellation with an optional reason.

use std::sync::Arc;

use serde_json::json;

use crate::application::Scheduler;
use crate::domain::audit::{AuditAction, AuditContext, AuditEntry};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{Notifier, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub reason: Option<String>,
    pub context: AuditContext,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
    /// Pending actions removed from the queue.
    pub actions_removed: u64,
}

/// Handler for cancelling subscriptions.
///
/// Cancelling an already cancelled or expired subscription is refused with
/// `AlreadyTerminal`.
pub struct CancelSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
}

impl CancelSubscriptionHandler {
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

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, SubscriptionError> {
        let now = Timestamp::now();

        // 1. Find the subscription
        let mut subscription = self
            .repository
            .find_by_id(cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound(cmd.subscription_id))?;
        let before = subscription.snapshot();

        // 2. Cancel (domain logic)
        subscription.cancel(cmd.reason.clone(), now)?;

        // 3. Persist with audit
        let description = match subscription.status_notes.as_deref() {
            Some(reason) => format!("Cancelled: {}", reason),
            None => "Cancelled".to_string(),
        };
        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::Cancelled,
            &cmd.context,
            description,
            now,
        )
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({ "reason": subscription.status_notes }));
        self.repository.commit(&subscription, &entry).await?;

        // 4. Leave the queue
        let actions_removed = self.scheduler.unschedule(subscription.id).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            reason = ?subscription.status_notes,
            "Subscription cancelled"
        );

        // 5. Tell the customer
        let reason = subscription.status_notes.clone().unwrap_or_default();
        if let Err(e) = self.notifier.notify_cancelled(&subscription, &reason).await {
            tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to send cancellation notification"
            );
        }

        Ok(CancelSubscriptionResult {
            subscription,
            actions_removed,
        })
    }
}
