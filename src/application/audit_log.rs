//! AuditLog - append and read the subscription audit trail.
//!
//! State changes never come through here: their entry is committed together
//! with the subscription by the repository. `append` is for events that
//! change no subscription state, such as refunds.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{DomainError, SubscriptionId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::AuditStore;

/// Audit store failure. The audit trail is the only tamper-evident record
/// of what happened to money, so this is always fatal.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("Audit store unavailable: {0}")]
    Unavailable(#[from] DomainError),
}

impl AuditError {
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl From<AuditError> for SubscriptionError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Unavailable(inner) => SubscriptionError::Storage(inner),
        }
    }
}

pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Appends one entry.
    pub async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.store.append(entry).await.map_err(|e| {
            tracing::error!(
                subscription_id = %entry.subscription_id,
                action = %entry.action,
                error = %e,
                "Audit append failed"
            );
            AuditError::Unavailable(e)
        })
    }

    /// Entries for a subscription, newest first.
    pub async fn history(&self, subscription_id: SubscriptionId) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self.store.entries_for(subscription_id).await?)
    }
}
