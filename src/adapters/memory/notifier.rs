//! Notifier that records what it was asked to send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId};
use crate::domain::subscription::Subscription;
use crate::ports::{Notifier, RenewalNotice, RetryInfo};

/// One notification as the customer would have received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Renewed {
        subscription_id: SubscriptionId,
        notice: RenewalNotice,
    },
    Failed {
        subscription_id: SubscriptionId,
        customer_message: String,
        retry: Option<RetryInfo>,
    },
    Cancelled {
        subscription_id: SubscriptionId,
        reason: String,
    },
}

impl Notification {
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            Notification::Renewed { subscription_id, .. }
            | Notification::Failed { subscription_id, .. }
            | Notification::Cancelled { subscription_id, .. } => *subscription_id,
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes delivery fail. Failed deliveries are not recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn deliver(&self, notification: Notification) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                "notification delivery failed",
            ));
        }
        self.sent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_renewed(&self, subscription: &Subscription, notice: &RenewalNotice) -> Result<(), DomainError> {
        self.deliver(Notification::Renewed {
            subscription_id: subscription.id,
            notice: notice.clone(),
        })
    }

    async fn notify_failed(
        &self,
        subscription: &Subscription,
        customer_message: &str,
        retry: Option<&RetryInfo>,
    ) -> Result<(), DomainError> {
        self.deliver(Notification::Failed {
            subscription_id: subscription.id,
            customer_message: customer_message.to_string(),
            retry: retry.cloned(),
        })
    }

    async fn notify_cancelled(&self, subscription: &Subscription, reason: &str) -> Result<(), DomainError> {
        self.deliver(Notification::Cancelled {
            subscription_id: subscription.id,
            reason: reason.to_string(),
        })
    }
}
