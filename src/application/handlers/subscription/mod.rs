//! Subscription handlers.
//!
//! ## Commands
//! - Processing a renewal (charge, apply outcome, reschedule)
//! - Skipping and unskipping billing dates
//! - Pausing and resuming
//! - Cancelling, by request or after an expired grace period
//! - Refunding to the customer's account funds
//!
//! ## Queries
//! - Audit history of a subscription

mod cancel_lapsed_subscriptions;
mod cancel_subscription;
mod get_subscription_history;
mod pause_subscription;
mod process_renewal;
mod refund_subscription;
mod skip_date;

// Commands
pub use cancel_lapsed_subscriptions::{
    CancelLapsedSubscriptionsCommand, CancelLapsedSubscriptionsHandler,
    CancelLapsedSubscriptionsResult,
};
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use pause_subscription::{
    PauseSubscriptionCommand, PauseSubscriptionHandler, PauseSubscriptionResult,
    ResumeSubscriptionCommand, ResumeSubscriptionHandler, ResumeSubscriptionResult,
};
pub use process_renewal::{
    ProcessRenewalCommand, ProcessRenewalHandler, RenewalOutcome, DATE_SKIPPED,
};
pub use refund_subscription::{
    RefundOutcome, RefundSubscriptionCommand, RefundSubscriptionHandler, DEFAULT_REFUND_REASON,
};
pub use skip_date::{SkipDateCommand, SkipDateHandler, SkipDateResult, UnskipDateHandler};

// Queries
pub use get_subscription_history::{
    GetSubscriptionHistoryHandler, GetSubscriptionHistoryQuery, GetSubscriptionHistoryResult,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::adapters::memory::{
        InMemoryActionQueue, InMemoryAuditStore, InMemorySubscriptionRepository, RecordingNotifier,
    };
    use crate::application::Scheduler;
    use crate::domain::audit::AuditEntry;
    use crate::domain::foundation::{Currency, CustomerId, Money, SubscriptionId, Timestamp};
    use crate::domain::scheduling::{ActionArgs, QueuedAction};
    use crate::domain::subscription::{
        BillingFrequency, BillingOwnership, NativeCustomer, Subscription,
    };
    use crate::ports::AuditStore;

    pub fn sub_id(id: i64) -> SubscriptionId {
        SubscriptionId::new(id).unwrap()
    }

    /// In-memory storage, queue and notifier wired together.
    pub struct Stack {
        pub audit: Arc<InMemoryAuditStore>,
        pub repo: Arc<InMemorySubscriptionRepository>,
        pub queue: Arc<InMemoryActionQueue>,
        pub scheduler: Arc<Scheduler>,
        pub notifier: Arc<RecordingNotifier>,
    }

    impl Stack {
        pub fn new() -> Self {
            let audit = Arc::new(InMemoryAuditStore::new());
            let repo = Arc::new(InMemorySubscriptionRepository::new(audit.clone()));
            let queue = Arc::new(InMemoryActionQueue::new());
            let scheduler = Arc::new(Scheduler::new(queue.clone()));
            Self {
                audit,
                repo,
                queue,
                scheduler,
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        pub fn with_native(id: i64) -> Self {
            let stack = Self::new();
            stack.add_native(id);
            stack
        }

        /// Active weekly subscription billed three days from now.
        pub fn add_native(&self, id: i64) {
            let now = Timestamp::now();
            self.repo.insert(Subscription::create(
                sub_id(id),
                Some(BillingOwnership::NativelyBilled {
                    customer: NativeCustomer {
                        customer_id: CustomerId::from_i64(id),
                        gateway_customer_id: Some(format!("cus_{}", id)),
                        default_payment_method_id: None,
                    },
                }),
                Money::parse_decimal("10.00", Currency::gbp()).unwrap(),
                BillingFrequency::weekly(),
                now.add_days(3).date(),
                now,
            ));
        }

        pub fn stored(&self, id: i64) -> Subscription {
            self.repo.get(sub_id(id)).unwrap()
        }

        pub async fn history(&self, id: i64) -> Vec<AuditEntry> {
            self.audit.entries_for(sub_id(id)).await.unwrap()
        }

        pub fn pending_actions(&self, id: i64) -> Vec<QueuedAction> {
            self.queue
                .all()
                .into_iter()
                .filter(|a| a.status.is_pending())
                .filter(|a| {
                    ActionArgs::parse(&a.args)
                        .map(|args| args.subscription_id == sub_id(id))
                        .unwrap_or(false)
                })
                .collect()
        }
    }
}
