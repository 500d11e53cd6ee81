//! Subscription repository port.
//!
//! Every mutation of a subscription is persisted together with the audit
//! entry describing it. Implementations must write both or neither.

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::domain::subscription::Subscription;
use async_trait::async_trait;

/// Repository port for Subscription persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by its ID.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Persist the subscription state and its audit entry atomically.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the subscription doesn't exist
    /// - `DatabaseError` / `StorageUnavailable` if either write fails; in that
    ///   case neither is applied
    async fn commit(&self, subscription: &Subscription, entry: &AuditEntry) -> Result<(), DomainError>;

    /// On-hold subscriptions whose `next_retry_at` is at or before `now`.
    async fn find_retry_due(&self, now: Timestamp) -> Result<Vec<Subscription>, DomainError>;

    /// On-hold subscriptions whose grace period ended strictly before `now`.
    async fn find_grace_lapsed(&self, now: Timestamp) -> Result<Vec<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
