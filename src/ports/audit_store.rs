//! Audit store port.
//!
//! Append-only storage for the audit trail. There is no update or delete.

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, SubscriptionId};
use async_trait::async_trait;

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Insert one entry.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` / `DatabaseError` when the store cannot be written.
    /// Callers must propagate this.
    async fn append(&self, entry: &AuditEntry) -> Result<(), DomainError>;

    /// All entries for a subscription, newest first.
    async fn entries_for(&self, subscription_id: SubscriptionId) -> Result<Vec<AuditEntry>, DomainError>;
}
