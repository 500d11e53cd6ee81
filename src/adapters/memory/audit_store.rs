//! In-memory audit store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::unavailable;
use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, SubscriptionId};
use crate::ports::AuditStore;

/// Append-only audit trail held in a vector, in append order.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StorageUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every entry in append order.
    pub fn all(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("audit store"));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DomainError> {
        self.check_available()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }

    async fn entries_for(&self, subscription_id: SubscriptionId) -> Result<Vec<AuditEntry>, DomainError> {
        self.check_available()?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        // Reverse append order first so the stable sort keeps later appends
        // ahead of earlier ones at equal timestamps.
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| e.subscription_id == subscription_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}
