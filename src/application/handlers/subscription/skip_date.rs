//! SkipDateHandler / UnskipDateHandler - manage the skip set.
//!
//! Both are idempotent: a no-op writes no audit entry.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use crate::domain::audit::{AuditAction, AuditContext, AuditEntry};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::SubscriptionRepository;

/// Command to skip (or unskip) one billing date.
#[derive(Debug, Clone)]
pub struct SkipDateCommand {
    pub subscription_id: SubscriptionId,
    pub date: NaiveDate,
    pub context: AuditContext,
}

#[derive(Debug, Clone)]
pub struct SkipDateResult {
    pub subscription: Subscription,
    /// False when the skip set already matched the request.
    pub changed: bool,
}

pub struct SkipDateHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl SkipDateHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: SkipDateCommand) -> Result<SkipDateResult, SubscriptionError> {
        apply(&self.repository, cmd, AuditAction::DateSkipped).await
    }
}

pub struct UnskipDateHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl UnskipDateHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: SkipDateCommand) -> Result<SkipDateResult, SubscriptionError> {
        apply(&self.repository, cmd, AuditAction::DateUnskipped).await
    }
}

async fn apply(
    repository: &Arc<dyn SubscriptionRepository>,
    cmd: SkipDateCommand,
    action: AuditAction,
) -> Result<SkipDateResult, SubscriptionError> {
    let now = Timestamp::now();
    let mut subscription = repository
        .find_by_id(cmd.subscription_id)
        .await?
        .ok_or(SubscriptionError::NotFound(cmd.subscription_id))?;
    let before = subscription.snapshot();

    let (changed, description) = if action == AuditAction::DateSkipped {
        (
            subscription.skip_date(cmd.date, now)?,
            format!("Skipped delivery date {}", cmd.date),
        )
    } else {
        (
            subscription.unskip_date(cmd.date, now)?,
            format!("Restored delivery date {}", cmd.date),
        )
    };

    if !changed {
        return Ok(SkipDateResult {
            subscription,
            changed,
        });
    }

    let entry = AuditEntry::new(subscription.id, action, &cmd.context, description, now)
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({ "date": cmd.date }));
    repository.commit(&subscription, &entry).await?;

    tracing::info!(
        subscription_id = %subscription.id,
        date = %cmd.date,
        action = %action,
        "Skip set updated"
    );

    Ok(SkipDateResult {
        subscription,
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::test_support::{sub_id, Stack};

    fn cmd(id: i64, date: NaiveDate) -> SkipDateCommand {
        SkipDateCommand {
            subscription_id: sub_id(id),
            date,
            context: AuditContext::operator(7, "Sam"),
        }
    }

    #[tokio::test]
    async fn skipping_twice_adds_the_date_once() {
        let stack = Stack::with_native(1);
        let handler = SkipDateHandler::new(stack.repo.clone());
        let date = Timestamp::now().add_days(14).date();

        let first = handler.handle(cmd(1, date)).await.unwrap();
        let second = handler.handle(cmd(1, date)).await.unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(stack.stored(1).skipped_dates.len(), 1);
        assert_eq!(stack.history(1).await.len(), 1);
    }

    #[tokio::test]
    async fn unskipping_absent_date_is_noop() {
        let stack = Stack::with_native(2);
        let handler = UnskipDateHandler::new(stack.repo.clone());

        let result = handler
            .handle(cmd(2, Timestamp::now().add_days(3).date()))
            .await
            .unwrap();

        assert!(!result.changed);
        assert!(stack.history(2).await.is_empty());
    }

    #[tokio::test]
    async fn skip_then_unskip_audits_operator() {
        let stack = Stack::with_native(3);
        let date = Timestamp::now().add_days(7).date();
        SkipDateHandler::new(stack.repo.clone()).handle(cmd(3, date)).await.unwrap();
        UnskipDateHandler::new(stack.repo.clone()).handle(cmd(3, date)).await.unwrap();

        assert!(stack.stored(3).skipped_dates.is_empty());
        let entries = stack.history(3).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::DateUnskipped);
        assert_eq!(entries[0].actor.display_name(), "Sam");
    }

    #[tokio::test]
    async fn cancelled_subscription_rejects_skip() {
        let stack = Stack::with_native(4);
        let mut sub = stack.stored(4);
        sub.cancel(None, Timestamp::now()).unwrap();
        stack.repo.insert(sub);

        let err = SkipDateHandler::new(stack.repo.clone())
            .handle(cmd(4, Timestamp::now().add_days(7).date()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::AlreadyTerminal { .. }));
    }
}
