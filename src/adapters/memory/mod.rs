//! In-memory adapters.
//!
//! Deterministic implementations of the storage, ledger and notification
//! ports for tests and local dry runs. Each store can be switched to an
//! "unavailable" mode to exercise fatal-error paths.

mod action_queue;
mod audit_store;
mod notifier;
mod renewal_ledger;
mod subscription_repository;

pub use action_queue::InMemoryActionQueue;
pub use audit_store::InMemoryAuditStore;
pub use notifier::{Notification, RecordingNotifier};
pub use renewal_ledger::InMemoryRenewalLedger;
pub use subscription_repository::InMemorySubscriptionRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

fn unavailable(store: &str) -> DomainError {
    DomainError::new(
        ErrorCode::StorageUnavailable,
        format!("{} is unavailable", store),
    )
}
