//! In-memory subscription repository.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::unavailable;
use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp};
use crate::domain::subscription::Subscription;
use crate::ports::{AuditStore, SubscriptionRepository};

/// Subscriptions keyed by id. `commit` writes the audit entry first and only
/// then the subscription, so a failed audit write leaves state untouched.
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<BTreeMap<SubscriptionId, Subscription>>,
    audit: Arc<dyn AuditStore>,
    unavailable: AtomicBool,
}

impl InMemorySubscriptionRepository {
    pub fn new(audit: Arc<dyn AuditStore>) -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            audit,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Stores a subscription as-is, replacing any existing one.
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscription.id, subscription);
    }

    /// Current stored state of a subscription.
    pub fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("subscription store"));
        }
        Ok(())
    }

    fn select(&self, predicate: impl Fn(&Subscription) -> bool) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| predicate(s))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        self.check_available()?;
        Ok(self.get(id))
    }

    async fn commit(&self, subscription: &Subscription, entry: &AuditEntry) -> Result<(), DomainError> {
        self.check_available()?;
        if self.get(subscription.id).is_none() {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("subscription {} not found", subscription.id),
            ));
        }
        self.audit.append(entry).await?;
        self.insert(subscription.clone());
        Ok(())
    }

    async fn find_retry_due(&self, now: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        self.check_available()?;
        Ok(self.select(|s| s.is_retry_due(now)))
    }

    async fn find_grace_lapsed(&self, now: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        self.check_available()?;
        Ok(self.select(|s| s.is_grace_lapsed(now)))
    }
}
