//! Durable action queue port.
//!
//! Models the legacy commerce system's action table: rows of
//! `{hook, args JSON, scheduled_at, status}`. The scheduler depends only on
//! insert, update-by-id, delete-matching and select-matching-ordered.

use crate::domain::foundation::{ActionId, DomainError, SubscriptionId, Timestamp};
use crate::domain::scheduling::{ActionStatus, NewQueuedAction, QueuedAction};
use async_trait::async_trait;

/// Row filter. `None` fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFilter {
    pub hook: String,
    pub subscription_id: Option<SubscriptionId>,
    pub status: Option<ActionStatus>,
}

impl ActionFilter {
    pub fn hook(hook: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            subscription_id: None,
            status: None,
        }
    }

    pub fn for_subscription(mut self, subscription_id: SubscriptionId) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Partial update of a queued row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionUpdate {
    pub scheduled_at: Option<Timestamp>,
    pub status: Option<ActionStatus>,
    pub last_attempt_at: Option<Timestamp>,
}

#[async_trait]
pub trait ActionQueue: Send + Sync {
    /// Insert a row and return its primary key.
    async fn insert(&self, action: NewQueuedAction) -> Result<ActionId, DomainError>;

    /// Update a row by primary key.
    ///
    /// # Errors
    ///
    /// `ActionNotFound` if no such row exists.
    async fn update(&self, id: ActionId, update: ActionUpdate) -> Result<(), DomainError>;

    /// Delete all matching rows, returning how many were removed.
    async fn delete_matching(&self, filter: &ActionFilter) -> Result<u64, DomainError>;

    /// All matching rows ordered by scheduled time ascending, then id.
    async fn select_matching(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError>;
}
