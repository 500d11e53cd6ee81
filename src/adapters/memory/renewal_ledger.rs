//! In-memory renewal ledger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::unavailable;
use crate::domain::billing::ChargeRecord;
use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, Money};
use crate::ports::{RefundRecord, RenewalLedger, RenewalRecord};

#[derive(Default)]
pub struct InMemoryRenewalLedger {
    charges: RwLock<Vec<ChargeRecord>>,
    renewals: RwLock<Vec<RenewalRecord>>,
    refunds: RwLock<Vec<RefundRecord>>,
    funds: RwLock<HashMap<CustomerId, Money>>,
    unavailable: AtomicBool,
}

impl InMemoryRenewalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn charges(&self) -> Vec<ChargeRecord> {
        self.charges.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn renewals(&self) -> Vec<RenewalRecord> {
        self.renewals.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn refunds(&self) -> Vec<RefundRecord> {
        self.refunds.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Account funds held for a customer, if any were ever credited.
    pub fn balance(&self, customer_id: CustomerId) -> Option<Money> {
        self.funds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&customer_id)
            .cloned()
    }

    /// Sets a customer's account funds directly.
    pub fn set_balance(&self, customer_id: CustomerId, balance: Money) {
        self.funds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(customer_id, balance);
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("renewal ledger"));
        }
        Ok(())
    }
}

#[async_trait]
impl RenewalLedger for InMemoryRenewalLedger {
    async fn record_charge(&self, record: &ChargeRecord) -> Result<(), DomainError> {
        self.check_available()?;
        self.charges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    async fn record_renewal(&self, record: &RenewalRecord) -> Result<(), DomainError> {
        self.check_available()?;
        self.renewals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    async fn credit_refund(&self, record: &RefundRecord) -> Result<Money, DomainError> {
        self.check_available()?;
        let mut funds = self.funds.write().unwrap_or_else(PoisonError::into_inner);
        let balance = match funds.get(&record.customer_id) {
            Some(current) if current.currency() != record.amount.currency() => {
                return Err(DomainError::new(
                    ErrorCode::ValidationFailed,
                    format!(
                        "account {} holds {}, refund is in {}",
                        record.customer_id,
                        current.currency(),
                        record.amount.currency()
                    ),
                ));
            }
            Some(current) => Money::from_minor(
                current.minor_units().saturating_add(record.amount.minor_units()),
                current.currency().clone(),
            )?,
            None => record.amount.clone(),
        };
        funds.insert(record.customer_id, balance.clone());
        self.refunds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(balance)
    }
}
