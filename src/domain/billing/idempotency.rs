//! Deterministic idempotency keys for billing cycles.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::SubscriptionId;

/// Key submitted with a charge so the gateway collapses repeats of the same
/// billing cycle into one real charge.
///
/// Derived only from the subscription id and the cycle's billing date, never
/// from the clock, so every retry of a cycle produces the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Key for the cycle billed on `billing_date`, e.g. `sub_42_billing_2025-01-01`.
    pub fn for_cycle(subscription_id: SubscriptionId, billing_date: NaiveDate) -> Self {
        Self(format!(
            "sub_{}_billing_{}",
            subscription_id,
            billing_date.format("%Y-%m-%d")
        ))
    }

    /// Rehydrates a stored key.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Synthetic transaction id recorded for a legacy-billed cycle.
pub fn legacy_transaction_id(subscription_id: SubscriptionId, billing_date: NaiveDate) -> String {
    format!("legacy_{}_{}", subscription_id, billing_date.format("%Y%m%d"))
}
