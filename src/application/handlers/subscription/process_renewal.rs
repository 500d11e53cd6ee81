//! ProcessRenewalHandler - bills one subscription for its current cycle.
//!
//! # Flow
//!
//! 1. Load the subscription and check it is billable
//! 2. A cycle whose billing date is skipped is passed over without charging
//! 3. Charge through the payment processor (never errors, failure is a value)
//! 4. Apply success or failure, committing state and audit entry together
//! 5. Notify, then reschedule the next cycle on success
//!
//! The renewal order goes to the ledger only after the commit, so a failed
//! commit leaves no order behind. Notification and ledger failures are logged
//! and never undo a committed renewal. Storage and queue failures are
//! propagated.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::application::{PaymentProcessor, Scheduler};
use crate::domain::audit::{AuditAction, AuditContext, AuditEntry};
use crate::domain::billing::ChargeResult;
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{RetryPolicy, Subscription, SubscriptionError};
use crate::ports::{
    Notifier, RenewalLedger, RenewalNotice, RenewalRecord, RetryInfo, SubscriptionRepository,
};

/// Outcome code reported when the cycle's billing date was skipped.
pub const DATE_SKIPPED: &str = "DATE_SKIPPED";

/// Command to bill a subscription's current cycle.
#[derive(Debug, Clone)]
pub struct ProcessRenewalCommand {
    pub subscription_id: SubscriptionId,
    pub context: AuditContext,
}

impl ProcessRenewalCommand {
    /// Renewal triggered by the scheduler rather than a person.
    pub fn system(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            context: AuditContext::system(),
        }
    }
}

/// What a renewal attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalOutcome {
    pub subscription_id: SubscriptionId,
    pub success: bool,
    /// Failure code, or [`DATE_SKIPPED`].
    pub code: Option<String>,
    /// Safe to show the customer.
    pub customer_message: Option<String>,
    pub transaction_id: Option<String>,
    pub retry_at: Option<Timestamp>,
    pub grace_ends_at: Option<Timestamp>,
    pub next_billing_at: NaiveDate,
    pub failed_payment_count: u32,
}

impl RenewalOutcome {
    pub fn is_skipped(&self) -> bool {
        self.code.as_deref() == Some(DATE_SKIPPED)
    }

    fn from_subscription(subscription: &Subscription, success: bool) -> Self {
        Self {
            subscription_id: subscription.id,
            success,
            code: None,
            customer_message: None,
            transaction_id: None,
            retry_at: subscription.next_retry_at,
            grace_ends_at: subscription.grace_period_ends_at,
            next_billing_at: subscription.next_billing_at,
            failed_payment_count: subscription.failed_payment_count,
        }
    }
}

/// Handler for renewal attempts.
pub struct ProcessRenewalHandler {
    repository: Arc<dyn SubscriptionRepository>,
    processor: Arc<PaymentProcessor>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
    ledger: Arc<dyn RenewalLedger>,
    retry_policy: Arc<dyn RetryPolicy>,
}

impl ProcessRenewalHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        processor: Arc<PaymentProcessor>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
        ledger: Arc<dyn RenewalLedger>,
        retry_policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            repository,
            processor,
            scheduler,
            notifier,
            ledger,
            retry_policy,
        }
    }

    pub fn retry_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.retry_policy
    }

    pub async fn handle(&self, cmd: ProcessRenewalCommand) -> Result<RenewalOutcome, SubscriptionError> {
        let now = Timestamp::now();

        // 1. Load and check billability
        let mut subscription = self
            .repository
            .find_by_id(cmd.subscription_id)
            .await?
            .ok_or(SubscriptionError::NotFound(cmd.subscription_id))?;
        subscription.ensure_billable(now.date())?;
        let before = subscription.snapshot();

        // 2. Skipped cycle
        if subscription.is_date_skipped(subscription.next_billing_at) {
            return self.pass_over_skipped(subscription, before, &cmd.context, now).await;
        }

        // 3. Charge
        let charge = self.processor.charge(&subscription).await;
        if let Err(e) = self.ledger.record_charge(&charge.record).await {
            tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to record charge attempt in ledger"
            );
        }

        // 4-5. Apply
        if charge.success {
            self.apply_success(subscription, before, charge, &cmd.context, now).await
        } else {
            self.apply_failure(subscription, before, charge, &cmd.context, now).await
        }
    }

    async fn pass_over_skipped(
        &self,
        mut subscription: Subscription,
        before: serde_json::Value,
        context: &AuditContext,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        let skipped = subscription.next_billing_at;
        subscription.record_skipped_cycle(now)?;

        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::RenewalSkipped,
            context,
            format!("Renewal skipped for billing date {}", skipped),
            now,
        )
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({ "skipped_date": skipped }));
        self.repository.commit(&subscription, &entry).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            skipped_date = %skipped,
            next_billing_at = %subscription.next_billing_at,
            "Renewal date skipped"
        );

        self.scheduler
            .schedule_due(subscription.id, Timestamp::start_of_date(subscription.next_billing_at))
            .await?;

        let mut outcome = RenewalOutcome::from_subscription(&subscription, true);
        outcome.code = Some(DATE_SKIPPED.to_string());
        Ok(outcome)
    }

    async fn apply_success(
        &self,
        mut subscription: Subscription,
        before: serde_json::Value,
        charge: ChargeResult,
        context: &AuditContext,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        let billed_date = subscription.next_billing_at;
        subscription.record_renewal_success(now)?;

        let renewal = RenewalRecord {
            order_number: RenewalRecord::order_number_for(subscription.id, now),
            subscription_id: subscription.id,
            amount: charge.record.amount.clone(),
            transaction_id: charge.transaction_id.clone(),
            channel: charge.record.channel,
            billing_date: billed_date,
            completed_at: now,
        };

        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::RenewalSuccess,
            context,
            format!("Renewal payment of {} succeeded", charge.record.amount),
            now,
        )
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({
            "transaction_id": charge.transaction_id,
            "billing_date": billed_date,
            "amount": charge.record.amount.to_decimal_string(),
            "currency": charge.record.amount.currency().as_str(),
            "channel": charge.record.channel.as_str(),
            "idempotency_key": charge.record.idempotency_key.as_str(),
            "order_number": renewal.order_number,
        }));
        self.repository.commit(&subscription, &entry).await?;

        // Only a committed renewal gets an order.
        if let Err(e) = self.ledger.record_renewal(&renewal).await {
            tracing::warn!(
                subscription_id = %subscription.id,
                order_number = %renewal.order_number,
                error = %e,
                "Failed to record renewal order in ledger"
            );
        }

        let notice = RenewalNotice {
            transaction_id: charge.transaction_id.clone(),
            amount_minor: charge.record.amount.minor_units(),
            currency: charge.record.amount.currency().as_str().to_string(),
            next_billing_at: subscription.next_billing_at,
        };
        if let Err(e) = self.notifier.notify_renewed(&subscription, &notice).await {
            tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to send renewal notification"
            );
        }

        self.scheduler
            .schedule_due(subscription.id, Timestamp::start_of_date(subscription.next_billing_at))
            .await?;

        let mut outcome = RenewalOutcome::from_subscription(&subscription, true);
        outcome.transaction_id = charge.transaction_id;
        Ok(outcome)
    }

    async fn apply_failure(
        &self,
        mut subscription: Subscription,
        before: serde_json::Value,
        charge: ChargeResult,
        context: &AuditContext,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        let (class, code, technical) = match &charge.failure {
            Some(f) => (f.class, f.code.clone(), f.technical_message.clone()),
            None => {
                return Err(SubscriptionError::invalid_state(
                    subscription.status,
                    "apply a failed charge without failure details to",
                ))
            }
        };
        let customer_message = charge.customer_message.clone().unwrap_or_default();

        let attempt = subscription.failed_payment_count.saturating_add(1);
        let retry_at = self.retry_policy.next_retry_at(attempt, class, now);
        subscription.record_renewal_failure(retry_at, self.retry_policy.grace_period(), now)?;

        let entry = AuditEntry::new(
            subscription.id,
            AuditAction::RenewalFailed,
            context,
            format!("Renewal payment failed: {}", customer_message),
            now,
        )
        .with_values(before, subscription.snapshot())
        .with_metadata(json!({
            "error_code": code,
            "failure_class": class.as_str(),
            "technical_error": technical,
            "customer_message": customer_message,
            "attempt": attempt,
            "transaction_id": charge.transaction_id,
            "idempotency_key": charge.record.idempotency_key.as_str(),
        }));
        self.repository.commit(&subscription, &entry).await?;

        tracing::warn!(
            subscription_id = %subscription.id,
            error_code = %code,
            failure_class = %class,
            attempt,
            retry_at = ?subscription.next_retry_at,
            grace_ends_at = ?subscription.grace_period_ends_at,
            "Renewal failed, subscription on hold"
        );

        let retry = RetryInfo {
            retry_at: subscription.next_retry_at,
            grace_ends_at: subscription.grace_period_ends_at,
            failed_attempts: subscription.failed_payment_count,
        };
        if let Err(e) = self
            .notifier
            .notify_failed(&subscription, &customer_message, Some(&retry))
            .await
        {
            tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to send payment failure notification"
            );
        }

        let mut outcome = RenewalOutcome::from_subscription(&subscription, false);
        outcome.code = Some(code);
        outcome.customer_message = Some(customer_message);
        outcome.transaction_id = charge.transaction_id;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryActionQueue, InMemoryAuditStore, InMemoryRenewalLedger,
        InMemorySubscriptionRepository, Notification, RecordingNotifier,
    };
    use crate::adapters::stripe::{MockPaymentGateway, ScriptedOutcome};
    use crate::domain::billing::{ChargeChannel, NO_PAYMENT_METHOD, NO_PAYMENT_METHOD_MESSAGE};
    use crate::domain::foundation::{Currency, CustomerId, Money};
    use crate::domain::subscription::{
        BackoffRetryPolicy, BillingFrequency, BillingOwnership, NativeCustomer, SubscriptionStatus,
    };
    use crate::ports::{AuditStore, PaymentMethodRef};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Harness
    // ════════════════════════════════════════════════════════════════════════════

    struct Harness {
        audit: Arc<InMemoryAuditStore>,
        repo: Arc<InMemorySubscriptionRepository>,
        queue: Arc<InMemoryActionQueue>,
        gateway: Arc<MockPaymentGateway>,
        notifier: Arc<RecordingNotifier>,
        ledger: Arc<InMemoryRenewalLedger>,
        handler: ProcessRenewalHandler,
    }

    fn harness() -> Harness {
        let audit = Arc::new(InMemoryAuditStore::new());
        let repo = Arc::new(InMemorySubscriptionRepository::new(audit.clone()));
        let queue = Arc::new(InMemoryActionQueue::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ledger = Arc::new(InMemoryRenewalLedger::new());
        let handler = ProcessRenewalHandler::new(
            repo.clone(),
            Arc::new(PaymentProcessor::new(gateway.clone())),
            Arc::new(Scheduler::new(queue.clone())),
            notifier.clone(),
            ledger.clone(),
            Arc::new(BackoffRetryPolicy::default()),
        );
        Harness {
            audit,
            repo,
            queue,
            gateway,
            notifier,
            ledger,
            handler,
        }
    }

    fn sub_id(id: i64) -> SubscriptionId {
        SubscriptionId::new(id).unwrap()
    }

    fn native(id: i64, price: &str) -> Subscription {
        let now = Timestamp::now();
        Subscription::create(
            sub_id(id),
            Some(BillingOwnership::NativelyBilled {
                customer: NativeCustomer {
                    customer_id: CustomerId::from_i64(id),
                    gateway_customer_id: Some(format!("cus_{}", id)),
                    default_payment_method_id: None,
                },
            }),
            Money::parse_decimal(price, Currency::gbp()).unwrap(),
            BillingFrequency::weekly(),
            now.date(),
            now,
        )
    }

    fn with_card(h: &Harness, id: i64) {
        h.gateway.add_payment_method(
            &format!("cus_{}", id),
            PaymentMethodRef {
                id: format!("pm_{}", id),
                is_default: true,
                updated_at: 1,
            },
        );
    }

    async fn history(h: &Harness, id: i64) -> Vec<AuditEntry> {
        h.audit.entries_for(sub_id(id)).await.unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn successful_renewal_resets_failures_and_audits_once() {
        let h = harness();
        let mut sub = native(2, "20.00");
        sub.failed_payment_count = 2;
        sub.status = SubscriptionStatus::OnHold;
        sub.next_retry_at = Some(Timestamp::now());
        sub.grace_period_ends_at = Some(Timestamp::now().add_days(5));
        let billed = sub.next_billing_at;
        h.repo.insert(sub);
        with_card(&h, 2);

        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(2))).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.transaction_id.is_some());
        let stored = h.repo.get(sub_id(2)).unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.failed_payment_count, 0);
        assert!(stored.next_retry_at.is_none());
        assert!(stored.grace_period_ends_at.is_none());
        assert_eq!(stored.next_billing_at, billed + chrono::Duration::days(7));

        let entries = history(&h, 2).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::RenewalSuccess);
    }

    #[tokio::test]
    async fn success_records_ledger_notifies_and_schedules_next_cycle() {
        let h = harness();
        h.repo.insert(native(3, "9.99"));
        with_card(&h, 3);

        h.handler.handle(ProcessRenewalCommand::system(sub_id(3))).await.unwrap();

        assert_eq!(h.ledger.charges().len(), 1);
        let renewals = h.ledger.renewals();
        assert_eq!(renewals.len(), 1);
        assert!(renewals[0].order_number.starts_with("SUB-3-"));

        assert!(matches!(h.notifier.sent()[0], Notification::Renewed { .. }));

        let pending: Vec<_> = h.queue.all().into_iter().filter(|a| a.status.is_pending()).collect();
        assert_eq!(pending.len(), 1);
        let next = h.repo.get(sub_id(3)).unwrap().next_billing_at;
        assert_eq!(pending[0].scheduled_at, Timestamp::start_of_date(next));
    }

    #[tokio::test]
    async fn legacy_billed_renewal_skips_gateway() {
        let h = harness();
        let mut sub = native(4, "15.00");
        sub.ownership = Some(BillingOwnership::LegacyBilled { legacy_user_id: 88 });
        h.repo.insert(sub);

        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(4))).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.transaction_id.unwrap().starts_with("legacy_4_"));
        assert_eq!(h.gateway.request_count(), 0);
        assert_eq!(h.ledger.renewals()[0].channel, ChargeChannel::Legacy);
    }

    #[tokio::test]
    async fn notification_failure_does_not_undo_renewal() {
        let h = harness();
        h.repo.insert(native(5, "10.00"));
        with_card(&h, 5);
        h.notifier.set_failing(true);

        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(5))).await.unwrap();

        assert!(outcome.success);
        assert_eq!(h.repo.get(sub_id(5)).unwrap().failed_payment_count, 0);
        assert_eq!(history(&h, 5).await.len(), 1);
    }

    #[tokio::test]
    async fn ledger_failure_does_not_fail_renewal() {
        let h = harness();
        h.repo.insert(native(6, "10.00"));
        with_card(&h, 6);
        h.ledger.set_unavailable(true);

        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(6))).await.unwrap();
        assert!(outcome.success);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn missing_payment_method_fails_and_starts_grace() {
        let h = harness();
        h.repo.insert(native(1, "12.50"));

        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(1))).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.code.as_deref(), Some(NO_PAYMENT_METHOD));
        assert_eq!(outcome.customer_message.as_deref(), Some(NO_PAYMENT_METHOD_MESSAGE));
        assert!(outcome.retry_at.is_none());
        assert!(outcome.grace_ends_at.is_some());

        let stored = h.repo.get(sub_id(1)).unwrap();
        assert_eq!(stored.failed_payment_count, 1);
        assert_eq!(stored.status, SubscriptionStatus::OnHold);
        assert!(stored.grace_period_ends_at.is_some());
    }

    #[tokio::test]
    async fn second_failure_keeps_grace_deadline() {
        let h = harness();
        h.repo.insert(native(7, "10.00"));
        with_card(&h, 7);
        h.gateway.set_fallback(ScriptedOutcome::Decline {
            code: "insufficient_funds".to_string(),
            message: "Your card has insufficient funds.".to_string(),
        });

        let first = h.handler.handle(ProcessRenewalCommand::system(sub_id(7))).await.unwrap();
        let second = h.handler.handle(ProcessRenewalCommand::system(sub_id(7))).await.unwrap();

        assert_eq!(first.grace_ends_at, second.grace_ends_at);
        assert_eq!(second.failed_payment_count, 2);
        assert!(second.retry_at.unwrap().is_after(&first.retry_at.unwrap()));
    }

    #[tokio::test]
    async fn failure_audit_keeps_technical_error_and_notification_does_not() {
        let h = harness();
        h.repo.insert(native(8, "10.00"));
        with_card(&h, 8);
        h.gateway.script(ScriptedOutcome::Decline {
            code: "expired_card".to_string(),
            message: "Your card has expired. Request req_9XyZ".to_string(),
        });

        h.handler.handle(ProcessRenewalCommand::system(sub_id(8))).await.unwrap();

        let entries = history(&h, 8).await;
        assert_eq!(entries[0].action, AuditAction::RenewalFailed);
        let technical = entries[0].metadata["technical_error"].as_str().unwrap();
        assert!(technical.contains("req_9XyZ"));

        match &h.notifier.sent()[0] {
            Notification::Failed { customer_message, retry, .. } => {
                assert!(!customer_message.contains("req_9XyZ"));
                assert!(customer_message.starts_with("Your card has expired"));
                assert_eq!(retry.as_ref().unwrap().failed_attempts, 1);
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn failure_does_not_advance_billing_date_or_schedule() {
        let h = harness();
        let sub = native(9, "10.00");
        let billed = sub.next_billing_at;
        h.repo.insert(sub);

        h.handler.handle(ProcessRenewalCommand::system(sub_id(9))).await.unwrap();

        assert_eq!(h.repo.get(sub_id(9)).unwrap().next_billing_at, billed);
        assert!(h.queue.all().is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Refusals
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let h = harness();
        let err = h.handler.handle(ProcessRenewalCommand::system(sub_id(99))).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound(_)));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn subscription_without_owner_is_refused_without_charge() {
        let h = harness();
        let mut sub = native(10, "10.00");
        sub.ownership = None;
        h.repo.insert(sub);

        let err = h.handler.handle(ProcessRenewalCommand::system(sub_id(10))).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::NoBillingTarget(_)));
        assert_eq!(h.ledger.charges().len(), 0);
        assert!(history(&h, 10).await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_subscription_is_refused() {
        let h = harness();
        let mut sub = native(11, "10.00");
        sub.cancel(None, Timestamp::now()).unwrap();
        h.repo.insert(sub);

        let err = h.handler.handle(ProcessRenewalCommand::system(sub_id(11))).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::AlreadyTerminal { .. }));
    }

    #[tokio::test]
    async fn paused_subscription_is_refused_without_counting_failure() {
        let h = harness();
        let mut sub = native(12, "10.00");
        sub.pause_until(Timestamp::now().add_days(10).date(), Timestamp::now()).unwrap();
        h.repo.insert(sub);

        let err = h.handler.handle(ProcessRenewalCommand::system(sub_id(12))).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Paused(_)));
        assert_eq!(h.repo.get(sub_id(12)).unwrap().failed_payment_count, 0);
    }

    #[tokio::test]
    async fn skipped_date_advances_without_charging() {
        let h = harness();
        let mut sub = native(13, "10.00");
        let billed = sub.next_billing_at;
        sub.skip_date(billed, Timestamp::now()).unwrap();
        h.repo.insert(sub);
        with_card(&h, 13);

        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(13))).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.is_skipped());
        assert_eq!(outcome.next_billing_at, billed + chrono::Duration::days(7));
        assert_eq!(h.gateway.request_count(), 0);
        assert_eq!(history(&h, 13).await[0].action, AuditAction::RenewalSkipped);
    }

    #[tokio::test]
    async fn audit_outage_is_fatal_and_leaves_state() {
        let h = harness();
        h.repo.insert(native(14, "10.00"));
        with_card(&h, 14);
        h.audit.set_unavailable(true);

        let err = h.handler.handle(ProcessRenewalCommand::system(sub_id(14))).await.unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(h.repo.get(sub_id(14)).unwrap().status, SubscriptionStatus::Active);
        assert!(h.notifier.sent().is_empty());
        assert!(h.ledger.renewals().is_empty());
    }

    #[tokio::test]
    async fn retry_after_audit_outage_records_a_single_order() {
        let h = harness();
        h.repo.insert(native(16, "10.00"));
        with_card(&h, 16);

        h.audit.set_unavailable(true);
        assert!(h.handler.handle(ProcessRenewalCommand::system(sub_id(16))).await.is_err());
        h.audit.set_unavailable(false);
        let outcome = h.handler.handle(ProcessRenewalCommand::system(sub_id(16))).await.unwrap();

        assert!(outcome.success);
        assert_eq!(h.gateway.real_charge_count(), 1);
        assert_eq!(h.ledger.renewals().len(), 1);
        assert_eq!(h.ledger.charges().len(), 2);
        assert_eq!(history(&h, 16).await.len(), 1);
    }

    #[tokio::test]
    async fn queue_outage_after_success_is_fatal_but_renewal_is_committed() {
        let h = harness();
        h.repo.insert(native(15, "10.00"));
        with_card(&h, 15);
        h.queue.set_unavailable(true);

        let err = h.handler.handle(ProcessRenewalCommand::system(sub_id(15))).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Scheduling(_)));
        assert!(h.repo.get(sub_id(15)).unwrap().last_payment_date.is_some());
    }
}
