//! PauseSubscriptionHandler / ResumeSubscriptionHandler.
//!
//! Pausing takes the subscription out of the action queue; resuming puts
//! its next billing date (rolled past today if needed) back in.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use crate::application::Scheduler;
use crate::domain::audit::{AuditAction, AuditContext, AuditEntry};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::scheduling::ScheduleOutcome;
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::SubscriptionRepository;

/// Command to pause billing until a future date.
#[derive(Debug, Clone)]
pub struct PauseSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub until: NaiveDate,
    pub context: AuditContext,
}

#[derive(Debug, Clone)]
pub struct PauseSubscriptionResult {
    pub subscription: Subscription,
    pub changed: bool,
}

pub struct PauseSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
    scheduler: Arc<Scheduler>,
}

impl PauseSubscriptionHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub async fn handle(
        &self,
        cmd: PauseSubscriptionCommand,
    ) -> Result<PauseSubscriptionResult, SubscriptionError> {
        let now = Timestamp::now();
        let mut subscription = self
            .repository
            .find_by_id(cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound(cmd.subscription_id))?;
        let before = subscription.snapshot();

        if !subscription.pause_until(cmd.until, now)? {
            return Ok(PauseSubscriptionResult {
                subscription,
                changed: false,
            });
        }

        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::Paused,
            &cmd.context,
            format!("Paused until {}", cmd.until),
            now,
        )
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({ "paused_until": cmd.until }));
        self.repository.commit(&subscription, &entry).await?;
        self.scheduler.unschedule(subscription.id).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            paused_until = %cmd.until,
            "Subscription paused"
        );

        Ok(PauseSubscriptionResult {
            subscription,
            changed: true,
        })
    }
}

/// Command to lift any pause.
#[derive(Debug, Clone)]
pub struct ResumeSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub context: AuditContext,
}

#[derive(Debug, Clone)]
pub struct ResumeSubscriptionResult {
    pub subscription: Subscription,
    pub changed: bool,
    pub schedule: ScheduleOutcome,
}

pub struct ResumeSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
    scheduler: Arc<Scheduler>,
}

impl ResumeSubscriptionHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub async fn handle(
        &self,
        cmd: ResumeSubscriptionCommand,
    ) -> Result<ResumeSubscriptionResult, SubscriptionError> {
        let now = Timestamp::now();
        let mut subscription = self
            .repository
            .find_by_id(cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound(cmd.subscription_id))?;
        let before = subscription.snapshot();

        if !subscription.resume(now)? {
            return Ok(ResumeSubscriptionResult {
                subscription,
                changed: false,
                schedule: ScheduleOutcome::NotScheduled,
            });
        }
        subscription.roll_forward_past(now.date())?;

        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::Resumed,
            &cmd.context,
            format!("Resumed, next billing {}", subscription.next_billing_at),
            now,
        )
        .with_values(before, subscription.snapshot());
        self.repository.commit(&subscription, &entry).await?;

        let schedule = self
            .scheduler
            .schedule_due(subscription.id, Timestamp::start_of_date(subscription.next_billing_at))
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            next_billing_at = %subscription.next_billing_at,
            "Subscription resumed"
        );

        Ok(ResumeSubscriptionResult {
            subscription,
            changed: true,
            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::test_support::{sub_id, Stack};
    use crate::domain::subscription::SubscriptionStatus;

    fn pause(id: i64, until: NaiveDate) -> PauseSubscriptionCommand {
        PauseSubscriptionCommand {
            subscription_id: sub_id(id),
            until,
            context: AuditContext::system(),
        }
    }

    fn resume(id: i64) -> ResumeSubscriptionCommand {
        ResumeSubscriptionCommand {
            subscription_id: sub_id(id),
            context: AuditContext::system(),
        }
    }

    #[tokio::test]
    async fn pause_sets_both_fields_and_unschedules() {
        let stack = Stack::with_native(1);
        stack
            .scheduler
            .schedule_due(sub_id(1), Timestamp::now().add_days(3))
            .await
            .unwrap();
        let until = Timestamp::now().add_days(30).date();

        let result = PauseSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(pause(1, until))
            .await
            .unwrap();

        assert!(result.changed);
        let stored = stack.stored(1);
        assert!(stored.is_paused);
        assert_eq!(stored.paused_until, Some(until));
        assert_eq!(stored.status, SubscriptionStatus::Paused);
        assert!(stack.pending_actions(1).is_empty());
    }

    #[tokio::test]
    async fn pausing_to_same_date_is_noop() {
        let stack = Stack::with_native(2);
        let handler = PauseSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone());
        let until = Timestamp::now().add_days(30).date();

        handler.handle(pause(2, until)).await.unwrap();
        let again = handler.handle(pause(2, until)).await.unwrap();

        assert!(!again.changed);
        assert_eq!(stack.history(2).await.len(), 1);
    }

    #[tokio::test]
    async fn pause_date_in_past_is_rejected() {
        let stack = Stack::with_native(3);
        let err = PauseSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(pause(3, Timestamp::now().minus_days(1).date()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn resume_clears_both_fields_and_reschedules() {
        let stack = Stack::with_native(4);
        PauseSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(pause(4, Timestamp::now().add_days(30).date()))
            .await
            .unwrap();

        let result = ResumeSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(resume(4))
            .await
            .unwrap();

        assert!(result.changed);
        assert!(result.schedule.is_scheduled());
        let stored = stack.stored(4);
        assert!(!stored.is_paused);
        assert!(stored.paused_until.is_none());
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert!(stored.next_billing_at > Timestamp::now().date());
        assert_eq!(stack.pending_actions(4).len(), 1);
    }

    #[tokio::test]
    async fn resume_of_unpaused_subscription_is_noop() {
        let stack = Stack::with_native(5);
        let result = ResumeSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(resume(5))
            .await
            .unwrap();

        assert!(!result.changed);
        assert!(stack.history(5).await.is_empty());
        assert!(stack.pending_actions(5).is_empty());
    }
}
