//! Renewal ledger port.
//!
//! Reporting mirror of billing activity: every charge attempt, a completed
//! renewal order for each successful cycle, and the store credit written by
//! refunds.

use crate::domain::billing::{ChargeChannel, ChargeRecord};
use crate::domain::foundation::{CustomerId, DomainError, Money, SubscriptionId, Timestamp};
use async_trait::async_trait;
use serde::Serialize;

/// Completed order mirroring a successful renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalRecord {
    /// `SUB-{id}-{yyyymmdd-hhmmss}`.
    pub order_number: String,
    pub subscription_id: SubscriptionId,
    pub amount: Money,
    pub transaction_id: Option<String>,
    pub channel: ChargeChannel,
    pub billing_date: chrono::NaiveDate,
    pub completed_at: Timestamp,
}

impl RenewalRecord {
    pub fn order_number_for(subscription_id: SubscriptionId, at: Timestamp) -> String {
        format!(
            "SUB-{}-{}",
            subscription_id,
            at.as_datetime().format("%Y%m%d-%H%M%S")
        )
    }
}

/// Credit transaction returning money to a customer's account funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundRecord {
    /// `refund-{unix seconds}-{suffix}`.
    pub transaction_id: String,
    pub subscription_id: SubscriptionId,
    /// Account credited: the legacy user or the native customer.
    pub customer_id: CustomerId,
    pub amount: Money,
    pub reason: String,
    pub created_at: Timestamp,
}

impl RefundRecord {
    pub fn transaction_id_for(at: Timestamp, suffix: &str) -> String {
        format!("refund-{}-{}", at.as_datetime().timestamp(), suffix)
    }
}

#[async_trait]
pub trait RenewalLedger: Send + Sync {
    /// Record one charge attempt, successful or not.
    async fn record_charge(&self, record: &ChargeRecord) -> Result<(), DomainError>;

    /// Record the completed order of a successful renewal.
    async fn record_renewal(&self, record: &RenewalRecord) -> Result<(), DomainError>;

    /// Credit the refund to the customer's account funds and record the
    /// transaction. Returns the new balance.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the account already holds another currency.
    async fn credit_refund(&self, record: &RefundRecord) -> Result<Money, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn renewal_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn RenewalLedger) {}
    }

    #[test]
    fn order_number_uses_second_precision_timestamp() {
        let at = Timestamp::from_datetime(Utc.with_ymd_and_hms(2025, 1, 8, 6, 5, 9).unwrap());
        let number = RenewalRecord::order_number_for(SubscriptionId::new(77).unwrap(), at);
        assert_eq!(number, "SUB-77-20250108-060509");
    }

    #[test]
    fn refund_transaction_id_uses_unix_seconds() {
        let at = Timestamp::from_datetime(Utc.with_ymd_and_hms(2025, 1, 8, 6, 5, 9).unwrap());
        assert_eq!(RefundRecord::transaction_id_for(at, "3f2a"), "refund-1736316309-3f2a");
    }
}
