//! Scheduler - the durable set of due billing actions.
//!
//! "Due" is a persistent, queryable fact in the legacy action queue rather
//! than an in-memory timer, so billing survives the driver being down.
//!
//! # Rules
//!
//! - A date that is not strictly in the future is never scheduled
//! - At most one pending action exists per subscription
//! - A completed action is history: it is never revived, a new one is created

use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::{ActionId, DomainError, SubscriptionId, Timestamp};
use crate::domain::scheduling::{
    ActionArgs, ActionStatus, DueAction, NewQueuedAction, ScheduleOutcome,
};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{ActionFilter, ActionQueue, ActionUpdate};

/// Hook name used by the legacy commerce system for renewal payments.
pub const DEFAULT_PAYMENT_HOOK: &str = "woocommerce_scheduled_subscription_payment";

/// Action queue failures. Always fatal for the calling operation.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("Action queue unavailable: {0}")]
    QueueUnavailable(#[from] DomainError),
}

impl From<SchedulerError> for SubscriptionError {
    fn from(err: SchedulerError) -> Self {
        SubscriptionError::Scheduling(err.to_string())
    }
}

pub struct Scheduler {
    queue: Arc<dyn ActionQueue>,
    hook: String,
}

impl Scheduler {
    pub fn new(queue: Arc<dyn ActionQueue>) -> Self {
        Self::with_hook(queue, DEFAULT_PAYMENT_HOOK)
    }

    pub fn with_hook(queue: Arc<dyn ActionQueue>, hook: impl Into<String>) -> Self {
        Self {
            queue,
            hook: hook.into(),
        }
    }

    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// Ensures a pending action exists for `subscription_id` at `when`.
    ///
    /// Returns [`ScheduleOutcome::NotScheduled`] (not an error) when `when`
    /// is not strictly in the future.
    pub async fn schedule_due(
        &self,
        subscription_id: SubscriptionId,
        when: Timestamp,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let now = Timestamp::now();
        if !when.is_after(&now) {
            tracing::info!(
                subscription_id = %subscription_id,
                scheduled_at = %when,
                "Not scheduling renewal payment, date is not in the future"
            );
            return Ok(ScheduleOutcome::NotScheduled);
        }

        let filter = ActionFilter::hook(&self.hook).for_subscription(subscription_id);
        let existing = self.queue.select_matching(&filter).await?;

        let mut pending = existing.iter().filter(|a| a.status.is_pending());
        if let Some(current) = pending.next() {
            for duplicate in pending {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    action_id = %duplicate.id,
                    "Cancelling duplicate pending renewal action"
                );
                self.queue
                    .update(
                        duplicate.id,
                        ActionUpdate {
                            status: Some(ActionStatus::Canceled),
                            ..ActionUpdate::default()
                        },
                    )
                    .await?;
            }

            if current.scheduled_at == when {
                return Ok(ScheduleOutcome::Unchanged(current.id));
            }

            self.queue
                .update(
                    current.id,
                    ActionUpdate {
                        scheduled_at: Some(when),
                        ..ActionUpdate::default()
                    },
                )
                .await?;
            tracing::info!(
                subscription_id = %subscription_id,
                action_id = %current.id,
                scheduled_at = %when,
                "Updated pending renewal action"
            );
            return Ok(ScheduleOutcome::Updated(current.id));
        }

        if let Some(completed) = existing.iter().find(|a| a.status == ActionStatus::Complete) {
            tracing::info!(
                subscription_id = %subscription_id,
                completed_action_id = %completed.id,
                "Found completed renewal action, creating a new one"
            );
        }

        let id = self
            .queue
            .insert(NewQueuedAction {
                hook: self.hook.clone(),
                args: ActionArgs::for_subscription(subscription_id).to_json(),
                scheduled_at: when,
                status: ActionStatus::Pending,
            })
            .await?;
        tracing::info!(
            subscription_id = %subscription_id,
            action_id = %id,
            scheduled_at = %when,
            "Created renewal action"
        );
        Ok(ScheduleOutcome::Created(id))
    }

    /// Deletes every pending action of a subscription. Idempotent.
    pub async fn unschedule(&self, subscription_id: SubscriptionId) -> Result<u64, SchedulerError> {
        let filter = ActionFilter::hook(&self.hook)
            .for_subscription(subscription_id)
            .with_status(ActionStatus::Pending);
        let deleted = self.queue.delete_matching(&filter).await?;
        if deleted > 0 {
            tracing::info!(
                subscription_id = %subscription_id,
                actions_deleted = deleted,
                "Unscheduled renewal actions"
            );
        }
        Ok(deleted)
    }

    /// All pending actions, earliest first, flagged overdue relative to now.
    ///
    /// Rows whose argument blob cannot be read are skipped with a warning.
    pub async fn list_pending(&self) -> Result<Vec<DueAction>, SchedulerError> {
        let now = Timestamp::now();
        let filter = ActionFilter::hook(&self.hook).with_status(ActionStatus::Pending);
        let rows = self.queue.select_matching(&filter).await?;

        let mut due: Vec<DueAction> = rows
            .iter()
            .filter_map(|row| match DueAction::from_queued(row, now) {
                Ok(action) => Some(action),
                Err(e) => {
                    tracing::warn!(action_id = %row.id, error = %e, "Skipping unreadable renewal action");
                    None
                }
            })
            .collect();
        due.sort_by_key(|a| (a.scheduled_at, a.action_id.as_i64()));
        Ok(due)
    }

    /// Subscriptions with an overdue pending action.
    pub async fn list_overdue(&self) -> Result<Vec<SubscriptionId>, SchedulerError> {
        Ok(self
            .list_pending()
            .await?
            .into_iter()
            .filter(|a| a.overdue)
            .map(|a| a.subscription_id)
            .collect())
    }

    /// Marks an action in progress so rescheduling creates a fresh row
    /// instead of moving this one. The claim time is stored with the row.
    pub async fn claim(&self, action_id: ActionId) -> Result<(), SchedulerError> {
        self.queue
            .update(
                action_id,
                ActionUpdate {
                    status: Some(ActionStatus::InProgress),
                    last_attempt_at: Some(Timestamp::now()),
                    ..ActionUpdate::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Returns every action claimed at or before `claimed_before` to the
    /// pending set.
    ///
    /// A claim only outlives its run when the runner died between claiming
    /// and settling, so these rows would otherwise never be billed again.
    pub async fn recover_stale_claims(
        &self,
        claimed_before: Timestamp,
    ) -> Result<Vec<ActionId>, SchedulerError> {
        let filter = ActionFilter::hook(&self.hook).with_status(ActionStatus::InProgress);
        let claimed = self.queue.select_matching(&filter).await?;

        let mut recovered = Vec::new();
        for action in claimed.iter().filter(|a| a.is_stale_claim(claimed_before)) {
            self.release(action.id).await?;
            tracing::warn!(
                action_id = %action.id,
                claimed_at = ?action.last_attempt_at,
                "Released abandoned renewal claim"
            );
            recovered.push(action.id);
        }
        Ok(recovered)
    }

    /// Returns a claimed action to the pending set.
    pub async fn release(&self, action_id: ActionId) -> Result<(), SchedulerError> {
        self.set_status(action_id, ActionStatus::Pending).await
    }

    /// Marks an action complete, as the legacy queue does when it runs.
    pub async fn complete(&self, action_id: ActionId) -> Result<(), SchedulerError> {
        self.set_status(action_id, ActionStatus::Complete).await
    }

    async fn set_status(&self, action_id: ActionId, status: ActionStatus) -> Result<(), SchedulerError> {
        self.queue
            .update(
                action_id,
                ActionUpdate {
                    status: Some(status),
                    ..ActionUpdate::default()
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryActionQueue;
    use crate::domain::scheduling::QueuedAction;

    fn sub(id: i64) -> SubscriptionId {
        SubscriptionId::new(id).unwrap()
    }

    fn setup() -> (Arc<InMemoryActionQueue>, Scheduler) {
        let queue = Arc::new(InMemoryActionQueue::new());
        let scheduler = Scheduler::new(queue.clone());
        (queue, scheduler)
    }

    fn rows_for(queue: &InMemoryActionQueue, id: i64) -> Vec<QueuedAction> {
        queue
            .all()
            .into_iter()
            .filter(|a| a.args == format!("{{\"subscription_id\":{}}}", id))
            .collect()
    }

    #[tokio::test]
    async fn past_or_present_date_is_not_scheduled() {
        let (queue, scheduler) = setup();

        let outcome = scheduler
            .schedule_due(sub(1), Timestamp::now().minus_days(1))
            .await
            .unwrap();

        assert_eq!(outcome, ScheduleOutcome::NotScheduled);
        assert!(queue.all().is_empty());
    }

    #[tokio::test]
    async fn past_date_does_not_touch_existing_pending_action() {
        let (queue, scheduler) = setup();
        let future = Timestamp::now().add_days(3);
        scheduler.schedule_due(sub(1), future).await.unwrap();

        scheduler
            .schedule_due(sub(1), Timestamp::now().minus_days(2))
            .await
            .unwrap();

        assert_eq!(rows_for(&queue, 1)[0].scheduled_at, future);
    }

    #[tokio::test]
    async fn creates_then_updates_then_leaves_unchanged() {
        let (_queue, scheduler) = setup();
        let first = Timestamp::now().add_days(7);
        let second = Timestamp::now().add_days(14);

        let created = scheduler.schedule_due(sub(2), first).await.unwrap();
        let id = created.action_id().unwrap();
        assert_eq!(created, ScheduleOutcome::Created(id));

        assert_eq!(
            scheduler.schedule_due(sub(2), second).await.unwrap(),
            ScheduleOutcome::Updated(id)
        );
        assert_eq!(
            scheduler.schedule_due(sub(2), second).await.unwrap(),
            ScheduleOutcome::Unchanged(id)
        );
    }

    #[tokio::test]
    async fn completed_action_is_not_revived() {
        let (queue, scheduler) = setup();
        let first = scheduler
            .schedule_due(sub(3), Timestamp::now().add_days(1))
            .await
            .unwrap()
            .action_id()
            .unwrap();
        scheduler.complete(first).await.unwrap();

        let outcome = scheduler
            .schedule_due(sub(3), Timestamp::now().add_days(8))
            .await
            .unwrap();

        let rows = rows_for(&queue, 3);
        assert_eq!(rows.len(), 2);
        assert!(matches!(outcome, ScheduleOutcome::Created(id) if id != first));
        let completed = rows.iter().find(|r| r.id == first).unwrap();
        assert_eq!(completed.status, ActionStatus::Complete);

        let pending = scheduler.list_pending().await.unwrap();
        assert_eq!(pending.iter().filter(|a| a.subscription_id == sub(3)).count(), 1);
    }

    #[tokio::test]
    async fn unschedule_removes_only_pending_and_is_idempotent() {
        let (queue, scheduler) = setup();
        let done = scheduler
            .schedule_due(sub(4), Timestamp::now().add_days(1))
            .await
            .unwrap()
            .action_id()
            .unwrap();
        scheduler.complete(done).await.unwrap();
        scheduler
            .schedule_due(sub(4), Timestamp::now().add_days(8))
            .await
            .unwrap();

        assert_eq!(scheduler.unschedule(sub(4)).await.unwrap(), 1);
        assert_eq!(scheduler.unschedule(sub(4)).await.unwrap(), 0);
        assert_eq!(rows_for(&queue, 4).len(), 1);
    }

    #[tokio::test]
    async fn list_pending_is_ordered_and_flags_overdue() {
        let (queue, scheduler) = setup();
        queue.seed(NewQueuedAction {
            hook: DEFAULT_PAYMENT_HOOK.to_string(),
            args: ActionArgs::for_subscription(sub(5)).to_json(),
            scheduled_at: Timestamp::now().minus_days(2),
            status: ActionStatus::Pending,
        });
        scheduler
            .schedule_due(sub(6), Timestamp::now().add_days(2))
            .await
            .unwrap();
        queue.seed(NewQueuedAction {
            hook: DEFAULT_PAYMENT_HOOK.to_string(),
            args: ActionArgs::for_subscription(sub(7)).to_json(),
            scheduled_at: Timestamp::now().minus_days(5),
            status: ActionStatus::Pending,
        });

        let pending = scheduler.list_pending().await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|a| a.subscription_id.as_i64()).collect();
        assert_eq!(ids, vec![7, 5, 6]);
        assert!(pending[0].overdue && pending[1].overdue && !pending[2].overdue);

        let overdue = scheduler.list_overdue().await.unwrap();
        assert_eq!(overdue, vec![sub(7), sub(5)]);
    }

    #[tokio::test]
    async fn other_hooks_and_bad_args_are_ignored() {
        let (queue, scheduler) = setup();
        queue.seed(NewQueuedAction {
            hook: "woocommerce_scheduled_subscription_expiration".to_string(),
            args: ActionArgs::for_subscription(sub(8)).to_json(),
            scheduled_at: Timestamp::now().minus_days(1),
            status: ActionStatus::Pending,
        });
        queue.seed(NewQueuedAction {
            hook: DEFAULT_PAYMENT_HOOK.to_string(),
            args: "not json".to_string(),
            scheduled_at: Timestamp::now().minus_days(1),
            status: ActionStatus::Pending,
        });

        assert!(scheduler.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_pending_actions_are_collapsed() {
        let (queue, scheduler) = setup();
        for days in [3, 4] {
            queue.seed(NewQueuedAction {
                hook: DEFAULT_PAYMENT_HOOK.to_string(),
                args: ActionArgs::for_subscription(sub(9)).to_json(),
                scheduled_at: Timestamp::now().add_days(days),
                status: ActionStatus::Pending,
            });
        }

        scheduler
            .schedule_due(sub(9), Timestamp::now().add_days(10))
            .await
            .unwrap();

        let rows = rows_for(&queue, 9);
        assert_eq!(rows.iter().filter(|r| r.status.is_pending()).count(), 1);
    }

    #[tokio::test]
    async fn claimed_action_leaves_the_slot_free_until_released() {
        let (queue, scheduler) = setup();
        let id = queue.seed(NewQueuedAction {
            hook: DEFAULT_PAYMENT_HOOK.to_string(),
            args: ActionArgs::for_subscription(sub(4)).to_json(),
            scheduled_at: Timestamp::now().minus_days(1),
            status: ActionStatus::Pending,
        });

        scheduler.claim(id).await.unwrap();
        assert!(scheduler.list_pending().await.unwrap().is_empty());

        scheduler.release(id).await.unwrap();
        assert_eq!(scheduler.list_overdue().await.unwrap(), vec![sub(4)]);

        scheduler.complete(id).await.unwrap();
        assert_eq!(rows_for(&queue, 4)[0].status, ActionStatus::Complete);
        assert!(scheduler.complete(ActionId::from_i64(999)).await.is_err());
    }

    #[tokio::test]
    async fn claim_records_when_it_was_taken() {
        let (queue, scheduler) = setup();
        let id = queue.seed(NewQueuedAction {
            hook: DEFAULT_PAYMENT_HOOK.to_string(),
            args: ActionArgs::for_subscription(sub(10)).to_json(),
            scheduled_at: Timestamp::now().minus_days(1),
            status: ActionStatus::Pending,
        });
        let before = Timestamp::now();

        scheduler.claim(id).await.unwrap();

        let row = &rows_for(&queue, 10)[0];
        assert_eq!(row.status, ActionStatus::InProgress);
        assert!(!row.last_attempt_at.unwrap().is_before(&before));
    }

    #[tokio::test]
    async fn only_claims_older_than_the_cutoff_are_recovered() {
        let (queue, scheduler) = setup();
        let mut ids = Vec::new();
        for id in [11, 12] {
            let action = queue.seed(NewQueuedAction {
                hook: DEFAULT_PAYMENT_HOOK.to_string(),
                args: ActionArgs::for_subscription(sub(id)).to_json(),
                scheduled_at: Timestamp::now().minus_days(1),
                status: ActionStatus::Pending,
            });
            scheduler.claim(action).await.unwrap();
            ids.push(action);
        }
        // Sub 11 was claimed by a run that died an hour ago.
        queue
            .update(
                ids[0],
                ActionUpdate {
                    last_attempt_at: Some(Timestamp::now().plus_secs(-3600)),
                    ..ActionUpdate::default()
                },
            )
            .await
            .unwrap();

        let recovered = scheduler
            .recover_stale_claims(Timestamp::now().plus_secs(-900))
            .await
            .unwrap();

        assert_eq!(recovered, vec![ids[0]]);
        assert_eq!(scheduler.list_overdue().await.unwrap(), vec![sub(11)]);
        assert_eq!(rows_for(&queue, 12)[0].status, ActionStatus::InProgress);
    }

    #[tokio::test]
    async fn completed_actions_are_never_recovered() {
        let (queue, scheduler) = setup();
        let id = queue.seed(NewQueuedAction {
            hook: DEFAULT_PAYMENT_HOOK.to_string(),
            args: ActionArgs::for_subscription(sub(13)).to_json(),
            scheduled_at: Timestamp::now().minus_days(3),
            status: ActionStatus::Pending,
        });
        scheduler.claim(id).await.unwrap();
        scheduler.complete(id).await.unwrap();

        let recovered = scheduler.recover_stale_claims(Timestamp::now()).await.unwrap();

        assert!(recovered.is_empty());
        assert_eq!(rows_for(&queue, 13)[0].status, ActionStatus::Complete);
    }

    #[tokio::test]
    async fn queue_failure_is_propagated() {
        let (queue, scheduler) = setup();
        queue.set_unavailable(true);

        let err = scheduler
            .schedule_due(sub(1), Timestamp::now().add_days(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::QueueUnavailable(_)));

        let sub_err: SubscriptionError = err.into();
        assert!(sub_err.is_fatal());
    }
}
