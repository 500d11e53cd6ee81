//! PaymentProcessor - one charge attempt per call, idempotent per cycle.
//!
//! # Algorithm
//!
//! 1. Legacy-billed subscriptions short-circuit: no gateway call, a
//!    synthetic transaction id, success
//! 2. Natively billed subscriptions need a resolvable payment method;
//!    none is a terminal `NO_PAYMENT_METHOD` failure
//! 3. The idempotency key comes from the subscription id and billing date
//! 4. The charge is submitted off-session with auto-confirm
//! 5. Failures are classified and mapped to a customer-safe message
//!
//! Every gateway call is bounded by a timeout. Nothing here returns `Err`:
//! payment failure is a value.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::billing::{
    customer_message, legacy_transaction_id, ChargeChannel, ChargeFailure, ChargeRecord,
    ChargeResult, ChargeStatus, FailureClass, IdempotencyKey, AUTHENTICATION_REQUIRED,
    CARD_DECLINED, GATEWAY_ERROR, GATEWAY_PENDING,
};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{BillingOwnership, NativeCustomer, Subscription};
use crate::ports::{
    ChargeRequest, GatewayCharge, GatewayChargeStatus, GatewayError, GatewayErrorCode,
    PaymentGateway,
};

/// Default bound on each gateway call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata `source` tag attached to every gateway charge.
const CHARGE_SOURCE: &str = "renewal-engine";

pub struct PaymentProcessor {
    gateway: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentProcessor {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::with_timeout(gateway, DEFAULT_GATEWAY_TIMEOUT)
    }

    pub fn with_timeout(gateway: Arc<dyn PaymentGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    /// Attempts the charge for the subscription's current billing cycle.
    pub async fn charge(&self, subscription: &Subscription) -> ChargeResult {
        let key = IdempotencyKey::for_cycle(subscription.id, subscription.next_billing_at);

        match &subscription.ownership {
            Some(BillingOwnership::LegacyBilled { legacy_user_id }) => {
                let transaction_id =
                    legacy_transaction_id(subscription.id, subscription.next_billing_at);
                tracing::info!(
                    subscription_id = %subscription.id,
                    legacy_user_id = *legacy_user_id,
                    transaction_id = %transaction_id,
                    "Legacy-billed renewal recorded without gateway charge"
                );
                let record = self.record(
                    subscription,
                    key,
                    Some(transaction_id),
                    ChargeStatus::Succeeded,
                    None,
                    ChargeChannel::Legacy,
                );
                ChargeResult::succeeded(record)
            }
            Some(BillingOwnership::NativelyBilled { customer }) => {
                self.charge_native(subscription, customer, key).await
            }
            None => {
                let failure = ChargeFailure::new(
                    FailureClass::Terminal,
                    "NO_BILLING_TARGET",
                    "subscription references neither a legacy user nor a customer",
                );
                self.failed(subscription, key, None, failure)
            }
        }
    }

    async fn charge_native(
        &self,
        subscription: &Subscription,
        customer: &NativeCustomer,
        key: IdempotencyKey,
    ) -> ChargeResult {
        let Some(gateway_customer_id) = customer.gateway_customer_id.as_deref() else {
            let failure = ChargeFailure::no_payment_method(format!(
                "customer {} has no gateway customer reference",
                customer.customer_id
            ));
            return self.failed(subscription, key, None, failure);
        };

        let resolved = tokio::time::timeout(
            self.timeout,
            self.gateway.resolve_default_method(
                gateway_customer_id,
                customer.default_payment_method_id.as_deref(),
            ),
        )
        .await;

        let method = match resolved {
            Err(_) => {
                let failure = ChargeFailure::timeout(format!(
                    "payment method lookup timed out after {}s",
                    self.timeout.as_secs()
                ));
                return self.failed(subscription, key, None, failure);
            }
            Ok(Err(e)) => return self.failed(subscription, key, None, classify_error(&e)),
            Ok(Ok(None)) => {
                let failure = ChargeFailure::no_payment_method(format!(
                    "no payment method on file for gateway customer {}",
                    gateway_customer_id
                ));
                return self.failed(subscription, key, None, failure);
            }
            Ok(Ok(Some(method))) => method,
        };

        let billing_date = subscription.next_billing_at.format("%Y-%m-%d").to_string();
        let mut metadata = BTreeMap::new();
        metadata.insert("subscription_id".to_string(), subscription.id.to_string());
        metadata.insert("customer_id".to_string(), customer.customer_id.to_string());
        metadata.insert("billing_date".to_string(), billing_date);
        metadata.insert("source".to_string(), CHARGE_SOURCE.to_string());

        let request = ChargeRequest {
            amount_minor: subscription.price.charge_amount(),
            currency: subscription.price.currency().to_gateway_code(),
            customer_id: gateway_customer_id.to_string(),
            payment_method_id: method.id,
            idempotency_key: key.clone(),
            description: format!(
                "Subscription Renewal - {}",
                subscription.plan_name.as_deref().unwrap_or("Plan")
            ),
            metadata,
        };

        tracing::debug!(
            subscription_id = %subscription.id,
            idempotency_key = %key,
            amount_minor = request.amount_minor,
            "Submitting renewal charge"
        );

        match tokio::time::timeout(self.timeout, self.gateway.create_charge(request)).await {
            Err(_) => {
                let failure = ChargeFailure::timeout(format!(
                    "charge request timed out after {}s",
                    self.timeout.as_secs()
                ));
                self.failed(subscription, key, None, failure)
            }
            Ok(Err(e)) => self.failed(subscription, key, None, classify_error(&e)),
            Ok(Ok(charge)) => match classify_status(&charge) {
                None => {
                    tracing::info!(
                        subscription_id = %subscription.id,
                        transaction_id = %charge.transaction_id,
                        amount_minor = subscription.price.charge_amount(),
                        "Renewal charge succeeded"
                    );
                    let record = self.record(
                        subscription,
                        key,
                        Some(charge.transaction_id),
                        ChargeStatus::Succeeded,
                        None,
                        ChargeChannel::Card,
                    );
                    ChargeResult::succeeded(record)
                }
                Some(failure) => {
                    self.failed(subscription, key, Some(charge.transaction_id), failure)
                }
            },
        }
    }

    fn failed(
        &self,
        subscription: &Subscription,
        key: IdempotencyKey,
        transaction_id: Option<String>,
        failure: ChargeFailure,
    ) -> ChargeResult {
        let message = customer_message(Some(&failure.code), &failure.technical_message);
        tracing::warn!(
            subscription_id = %subscription.id,
            idempotency_key = %key,
            error_code = %failure.code,
            failure_class = %failure.class,
            technical_error = %failure.technical_message,
            "Renewal charge failed"
        );
        let channel = match subscription.ownership {
            Some(BillingOwnership::LegacyBilled { .. }) => ChargeChannel::Legacy,
            _ => ChargeChannel::Card,
        };
        let record = self.record(
            subscription,
            key,
            transaction_id,
            ChargeStatus::Failed,
            Some(failure.code.clone()),
            channel,
        );
        ChargeResult::failed(failure, message, record)
    }

    fn record(
        &self,
        subscription: &Subscription,
        key: IdempotencyKey,
        transaction_id: Option<String>,
        status: ChargeStatus,
        error_code: Option<String>,
        channel: ChargeChannel,
    ) -> ChargeRecord {
        ChargeRecord {
            subscription_id: subscription.id,
            idempotency_key: key,
            transaction_id,
            amount: subscription.price.clone(),
            status,
            error_code,
            channel,
            created_at: Timestamp::now(),
        }
    }
}

/// Maps a gateway error to a failure class and code.
fn classify_error(err: &GatewayError) -> ChargeFailure {
    let technical = err.to_string();
    match err.code {
        GatewayErrorCode::Timeout => ChargeFailure::timeout(technical),
        GatewayErrorCode::CardDeclined => {
            let code = err.provider_code.as_deref().unwrap_or(CARD_DECLINED);
            ChargeFailure::new(FailureClass::Declined, code, technical)
        }
        GatewayErrorCode::NetworkError
        | GatewayErrorCode::AuthenticationError
        | GatewayErrorCode::InvalidRequest
        | GatewayErrorCode::RateLimitExceeded
        | GatewayErrorCode::ProviderError => {
            let code = err.provider_code.as_deref().unwrap_or(GATEWAY_ERROR);
            ChargeFailure::new(FailureClass::Transient, code, technical)
        }
    }
}

/// Maps a non-success charge status to a failure; `None` means success.
fn classify_status(charge: &GatewayCharge) -> Option<ChargeFailure> {
    let technical = charge
        .error_message
        .clone()
        .unwrap_or_else(|| format!("payment {} ended as {:?}", charge.transaction_id, charge.status));
    match charge.status {
        GatewayChargeStatus::Succeeded => None,
        GatewayChargeStatus::RequiresAction => Some(ChargeFailure::new(
            FailureClass::Declined,
            AUTHENTICATION_REQUIRED,
            technical,
        )),
        GatewayChargeStatus::Processing => Some(ChargeFailure::new(
            FailureClass::Ambiguous,
            GATEWAY_PENDING,
            technical,
        )),
        GatewayChargeStatus::Failed => Some(ChargeFailure::new(
            FailureClass::Declined,
            charge.error_code.as_deref().unwrap_or(CARD_DECLINED),
            technical,
        )),
    }
}
