//! In-memory legacy action queue.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::unavailable;
use crate::domain::foundation::{ActionId, DomainError, ErrorCode};
use crate::domain::scheduling::{ActionArgs, NewQueuedAction, QueuedAction};
use crate::ports::{ActionFilter, ActionQueue, ActionUpdate};

/// Rows of the action table, matched on hook, status and the subscription
/// id inside the JSON argument blob.
pub struct InMemoryActionQueue {
    rows: RwLock<Vec<QueuedAction>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryActionQueue {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Inserts a row directly, bypassing availability checks.
    pub fn seed(&self, action: NewQueuedAction) -> ActionId {
        let id = ActionId::from_i64(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(QueuedAction {
                id,
                hook: action.hook,
                args: action.args,
                scheduled_at: action.scheduled_at,
                status: action.status,
                last_attempt_at: None,
            });
        id
    }

    /// Every row in insertion order.
    pub fn all(&self) -> Vec<QueuedAction> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("action queue"));
        }
        Ok(())
    }
}

impl Default for InMemoryActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(row: &QueuedAction, filter: &ActionFilter) -> bool {
    if row.hook != filter.hook {
        return false;
    }
    if let Some(status) = filter.status {
        if row.status != status {
            return false;
        }
    }
    match filter.subscription_id {
        Some(id) => ActionArgs::parse(&row.args)
            .map(|args| args.subscription_id == id)
            .unwrap_or(false),
        None => true,
    }
}

#[async_trait]
impl ActionQueue for InMemoryActionQueue {
    async fn insert(&self, action: NewQueuedAction) -> Result<ActionId, DomainError> {
        self.check_available()?;
        Ok(self.seed(action))
    }

    async fn update(&self, id: ActionId, update: ActionUpdate) -> Result<(), DomainError> {
        self.check_available()?;
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = rows.iter_mut().find(|r| r.id == id).ok_or_else(|| {
            DomainError::new(ErrorCode::ActionNotFound, format!("action {} not found", id))
        })?;
        if let Some(at) = update.scheduled_at {
            row.scheduled_at = at;
        }
        if let Some(status) = update.status {
            row.status = status;
        }
        if let Some(at) = update.last_attempt_at {
            row.last_attempt_at = Some(at);
        }
        Ok(())
    }

    async fn delete_matching(&self, filter: &ActionFilter) -> Result<u64, DomainError> {
        self.check_available()?;
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|r| !matches(r, filter));
        Ok((before - rows.len()) as u64)
    }

    async fn select_matching(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError> {
        self.check_available()?;
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut selected: Vec<QueuedAction> =
            rows.iter().filter(|r| matches(r, filter)).cloned().collect();
        selected.sort_by_key(|r| (r.scheduled_at, r.id.as_i64()));
        Ok(selected)
    }
}
