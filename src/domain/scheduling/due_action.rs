//! Due actions: persisted "bill this subscription at/after T" markers.
//!
//! The durable queue belongs to the legacy commerce system and stores
//! arguments as a JSON blob. [`QueuedAction`] is that raw row;
//! [`ActionArgs`] is the only place the blob is read or written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ActionId, SubscriptionId, Timestamp, ValidationError};

/// Status of a queued action, as stored by the legacy queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    Canceled,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::InProgress => "in-progress",
            ActionStatus::Complete => "complete",
            ActionStatus::Failed => "failed",
            ActionStatus::Canceled => "canceled",
        }
    }

    /// Only pending actions occupy a subscription's schedule slot.
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionStatus::Pending)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActionStatus::Pending),
            "in-progress" => Ok(ActionStatus::InProgress),
            "complete" => Ok(ActionStatus::Complete),
            "failed" => Ok(ActionStatus::Failed),
            "canceled" => Ok(ActionStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "action_status",
                format!("unknown action status '{}'", other),
            )),
        }
    }
}

/// Typed view of the JSON argument blob, e.g. `{"subscription_id":42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionArgs {
    pub subscription_id: SubscriptionId,
}

impl ActionArgs {
    pub fn for_subscription(subscription_id: SubscriptionId) -> Self {
        Self { subscription_id }
    }

    /// Parses the raw blob stored in the queue.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(raw)
            .map_err(|e| ValidationError::invalid_format("args", e.to_string()))
    }

    /// Serialises to the blob format the queue stores.
    pub fn to_json(&self) -> String {
        format!("{{\"subscription_id\":{}}}", self.subscription_id)
    }
}

/// Raw row of the durable action queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: ActionId,
    pub hook: String,
    pub args: String,
    pub scheduled_at: Timestamp,
    pub status: ActionStatus,
    /// When a runner last claimed the row; unset until the first claim.
    pub last_attempt_at: Option<Timestamp>,
}

impl QueuedAction {
    /// An in-progress row whose claim is older than `cutoff`.
    ///
    /// Rows claimed before claim times were recorded fall back to their
    /// scheduled time.
    pub fn is_stale_claim(&self, cutoff: Timestamp) -> bool {
        self.status == ActionStatus::InProgress
            && !self.last_attempt_at.unwrap_or(self.scheduled_at).is_after(&cutoff)
    }
}

/// A row to be inserted into the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueuedAction {
    pub hook: String,
    pub args: String,
    pub scheduled_at: Timestamp,
    pub status: ActionStatus,
}

/// A pending billing action, as seen by the rest of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueAction {
    pub action_id: ActionId,
    pub subscription_id: SubscriptionId,
    pub scheduled_at: Timestamp,
    pub status: ActionStatus,
    /// Scheduled strictly before the time the list was taken.
    pub overdue: bool,
}

impl DueAction {
    /// Builds the typed view of a raw row, relative to `now`.
    pub fn from_queued(action: &QueuedAction, now: Timestamp) -> Result<Self, ValidationError> {
        let args = ActionArgs::parse(&action.args)?;
        Ok(Self {
            action_id: action.id,
            subscription_id: args.subscription_id,
            scheduled_at: action.scheduled_at,
            status: action.status,
            overdue: action.scheduled_at.is_before(&now),
        })
    }
}

/// Result of asking the scheduler to schedule a billing date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The date was not in the future; nothing was written.
    NotScheduled,

    /// A new pending action was inserted.
    Created(ActionId),

    /// The existing pending action was moved to the new date.
    Updated(ActionId),

    /// The existing pending action already had this date.
    Unchanged(ActionId),
}

impl ScheduleOutcome {
    pub fn is_scheduled(&self) -> bool {
        !matches!(self, ScheduleOutcome::NotScheduled)
    }

    pub fn action_id(&self) -> Option<ActionId> {
        match self {
            ScheduleOutcome::NotScheduled => None,
            ScheduleOutcome::Created(id)
            | ScheduleOutcome::Updated(id)
            | ScheduleOutcome::Unchanged(id) => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_roundtrip_through_blob() {
        let args = ActionArgs::for_subscription(SubscriptionId::new(42).unwrap());
        assert_eq!(args.to_json(), "{\"subscription_id\":42}");
        assert_eq!(ActionArgs::parse(&args.to_json()).unwrap(), args);
    }

    #[test]
    fn args_parse_tolerates_extra_fields_and_rejects_garbage() {
        let parsed = ActionArgs::parse("{\"subscription_id\":7,\"retry\":true}").unwrap();
        assert_eq!(parsed.subscription_id.as_i64(), 7);
        assert!(ActionArgs::parse("[]").is_err());
        assert!(ActionArgs::parse("{\"order_id\":7}").is_err());
    }

    #[test]
    fn due_action_flags_overdue_strictly() {
        let now = Timestamp::now();
        let mut row = QueuedAction {
            id: ActionId::from_i64(1),
            hook: "hook".to_string(),
            args: "{\"subscription_id\":3}".to_string(),
            scheduled_at: now,
            status: ActionStatus::Pending,
            last_attempt_at: None,
        };
        assert!(!DueAction::from_queued(&row, now).unwrap().overdue);

        row.scheduled_at = now.plus_secs(-1);
        assert!(DueAction::from_queued(&row, now).unwrap().overdue);
    }

    #[test]
    fn claim_goes_stale_after_the_cutoff() {
        let now = Timestamp::now();
        let mut row = QueuedAction {
            id: ActionId::from_i64(2),
            hook: "hook".to_string(),
            args: "{\"subscription_id\":3}".to_string(),
            scheduled_at: now.minus_days(1),
            status: ActionStatus::InProgress,
            last_attempt_at: Some(now.plus_secs(-60)),
        };
        assert!(row.is_stale_claim(now.plus_secs(-30)));
        assert!(!row.is_stale_claim(now.plus_secs(-120)));

        row.last_attempt_at = None;
        assert!(row.is_stale_claim(now.plus_secs(-120)));

        row.status = ActionStatus::Pending;
        assert!(!row.is_stale_claim(now));
    }

    #[test]
    fn only_pending_status_is_pending() {
        assert!(ActionStatus::Pending.is_pending());
        assert!(!ActionStatus::Complete.is_pending());
        assert_eq!("in-progress".parse::<ActionStatus>(), Ok(ActionStatus::InProgress));
    }

    #[test]
    fn outcome_exposes_action_id() {
        assert_eq!(ScheduleOutcome::NotScheduled.action_id(), None);
        assert_eq!(
            ScheduleOutcome::Updated(ActionId::from_i64(9)).action_id(),
            Some(ActionId::from_i64(9))
        );
        assert!(!ScheduleOutcome::NotScheduled.is_scheduled());
    }
}
