//! RefundSubscriptionHandler - credits money back to a customer's account
//! funds, usually when a subscription is cancelled part-way through a cycle.
//!
//! Refunds never touch the card gateway and never change the subscription
//! itself. A refund that cannot be made comes back as a refused
//! [`RefundOutcome`]; only storage failures are errors.
//!
//! The credit is written before the audit entry. If the audit append then
//! fails the error is fatal and the transaction id is logged so the credit
//! can be traced.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::application::AuditLog;
use crate::domain::audit::{AuditAction, AuditContext, AuditEntry};
use crate::domain::foundation::{CustomerId, Money, SubscriptionId, Timestamp};
use crate::domain::subscription::{BillingOwnership, SubscriptionError};
use crate::ports::{RefundRecord, RenewalLedger, SubscriptionRepository};

/// Reason recorded when the caller gives none.
pub const DEFAULT_REFUND_REASON: &str = "Subscription cancellation";

#[derive(Debug, Clone)]
pub struct RefundSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub amount: Money,
    pub reason: Option<String>,
    pub context: AuditContext,
}

/// What a refund did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundOutcome {
    pub subscription_id: SubscriptionId,
    pub success: bool,
    pub transaction_id: Option<String>,
    pub refunded: Option<Money>,
    /// Account funds after the credit.
    pub new_balance: Option<Money>,
    /// Why the refund was refused.
    pub error: Option<String>,
}

impl RefundOutcome {
    fn refused(subscription_id: SubscriptionId, error: impl Into<String>) -> Self {
        Self {
            subscription_id,
            success: false,
            transaction_id: None,
            refunded: None,
            new_balance: None,
            error: Some(error.into()),
        }
    }
}

pub struct RefundSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn RenewalLedger>,
    audit_log: Arc<AuditLog>,
}

impl RefundSubscriptionHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn RenewalLedger>,
        audit_log: Arc<AuditLog>,
    ) -> Self {
        Self {
            repository,
            ledger,
            audit_log,
        }
    }

    pub async fn handle(
        &self,
        cmd: RefundSubscriptionCommand,
    ) -> Result<RefundOutcome, SubscriptionError> {
        let now = Timestamp::now();
        let id = cmd.subscription_id;

        if cmd.amount.minor_units() == 0 {
            return Ok(RefundOutcome::refused(id, "Refund amount must be positive"));
        }

        // 1. Resolve the account to credit
        let Some(subscription) = self.repository.find_by_id(id).await? else {
            return Ok(RefundOutcome::refused(id, "Subscription not found"));
        };
        let customer_id = match &subscription.ownership {
            Some(BillingOwnership::LegacyBilled { legacy_user_id }) => {
                CustomerId::from_i64(*legacy_user_id)
            }
            Some(BillingOwnership::NativelyBilled { customer }) => customer.customer_id,
            None => return Ok(RefundOutcome::refused(id, "Customer not found")),
        };
        if cmd.amount.currency() != subscription.price.currency() {
            return Ok(RefundOutcome::refused(
                id,
                format!(
                    "Refund is in {}, subscription is billed in {}",
                    cmd.amount.currency(),
                    subscription.price.currency()
                ),
            ));
        }

        // 2. Credit account funds
        let suffix = Uuid::new_v4().simple().to_string();
        let record = RefundRecord {
            transaction_id: RefundRecord::transaction_id_for(now, &suffix[..8]),
            subscription_id: id,
            customer_id,
            amount: cmd.amount.clone(),
            reason: cmd.reason.unwrap_or_else(|| DEFAULT_REFUND_REASON.to_string()),
            created_at: now,
        };
        let new_balance = match self.ledger.credit_refund(&record).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::error!(
                    subscription_id = %id,
                    amount = %record.amount,
                    error = %e,
                    "Error processing refund"
                );
                return Ok(RefundOutcome::refused(id, e.message));
            }
        };

        // 3. Audit
        let entry = AuditEntry::new(
            id,
            AuditAction::Refunded,
            &cmd.context,
            format!("Refunded {}: {}", record.amount, record.reason),
            now,
        )
        .with_metadata(json!({
            "transaction_id": record.transaction_id,
            "customer_id": customer_id,
            "amount": record.amount.to_decimal_string(),
            "currency": record.amount.currency().as_str(),
            "new_balance": new_balance.to_decimal_string(),
            "reason": record.reason,
        }));
        if let Err(e) = self.audit_log.append(&entry).await {
            tracing::error!(
                subscription_id = %id,
                transaction_id = %record.transaction_id,
                error = %e,
                "Refund credited but not audited"
            );
            return Err(e.into());
        }

        tracing::info!(
            subscription_id = %id,
            customer_id = %customer_id,
            amount = %record.amount,
            transaction_id = %record.transaction_id,
            "Subscription refund processed"
        );

        Ok(RefundOutcome {
            subscription_id: id,
            success: true,
            transaction_id: Some(record.transaction_id),
            refunded: Some(record.amount),
            new_balance: Some(new_balance),
            error: None,
        })
    }
}
