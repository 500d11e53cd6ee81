//! Mock payment gateway for testing.
//!
//! Behaves like the real gateway where it matters for billing correctness:
//! a repeated idempotency key replays the first result instead of charging
//! again. Supports:
//! - Stored payment methods per gateway customer
//! - Scripted outcomes (declines, pending, errors, hangs)
//! - Call tracking

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{
    select_default_method, ChargeRequest, GatewayCharge, GatewayChargeStatus, GatewayError,
    PaymentGateway, PaymentMethodRef,
};

/// What the next new charge request should produce.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed,
    /// Card decline with a gateway decline code.
    Decline { code: String, message: String },
    RequiresAction,
    Processing,
    Error(GatewayError),
    /// Never answers; only a caller-side timeout ends the call.
    Hang,
}

/// Mock payment gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.add_payment_method("cus_1", method);
/// gateway.script(ScriptedOutcome::Decline { code: "expired_card".into(), message: "...".into() });
/// ```
#[derive(Default)]
pub struct MockPaymentGateway {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    /// Stored methods keyed by gateway customer id.
    methods: HashMap<String, Vec<PaymentMethodRef>>,

    /// Outcomes consumed in order by new idempotency keys.
    script: VecDeque<ScriptedOutcome>,

    /// Used once the script is exhausted.
    fallback: Option<ScriptedOutcome>,

    /// First answer per idempotency key, replayed on repeats.
    by_key: HashMap<String, Result<GatewayCharge, GatewayError>>,

    requests: Vec<ChargeRequest>,
    lookups: usize,
    real_charges: usize,
    lookup_error: Option<GatewayError>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Stores a payment method for a gateway customer.
    pub fn add_payment_method(&self, gateway_customer_id: &str, method: PaymentMethodRef) {
        self.state()
            .methods
            .entry(gateway_customer_id.to_string())
            .or_default()
            .push(method);
    }

    /// Queues the outcome of the next charge with a new idempotency key.
    pub fn script(&self, outcome: ScriptedOutcome) {
        self.state().script.push_back(outcome);
    }

    /// Outcome for every new key once the script runs out.
    pub fn set_fallback(&self, outcome: ScriptedOutcome) {
        self.state().fallback = Some(outcome);
    }

    /// Makes payment method lookups fail.
    pub fn fail_lookups(&self, error: GatewayError) {
        self.state().lookup_error = Some(error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    /// Charges that reached "the bank": distinct keys answered with a charge.
    pub fn real_charge_count(&self) -> usize {
        self.state().real_charges
    }

    /// Every `create_charge` call, replays included.
    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    pub fn lookup_count(&self) -> usize {
        self.state().lookups
    }

    pub fn last_request(&self) -> Option<ChargeRequest> {
        self.state().requests.last().cloned()
    }

    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.state().requests.clone()
    }
}

fn answer(outcome: ScriptedOutcome, transaction_id: String) -> Result<GatewayCharge, GatewayError> {
    match outcome {
        ScriptedOutcome::Succeed => Ok(GatewayCharge::succeeded(transaction_id)),
        ScriptedOutcome::Decline { code, message } => {
            Err(GatewayError::card_declined(message).with_provider_code(code))
        }
        ScriptedOutcome::RequiresAction => Ok(GatewayCharge {
            transaction_id,
            status: GatewayChargeStatus::RequiresAction,
            error_code: None,
            error_message: Some("payment requires customer authentication".to_string()),
        }),
        ScriptedOutcome::Processing => Ok(GatewayCharge {
            transaction_id,
            status: GatewayChargeStatus::Processing,
            error_code: None,
            error_message: None,
        }),
        ScriptedOutcome::Error(e) => Err(e),
        // Handled before answering.
        ScriptedOutcome::Hang => Err(GatewayError::timeout("mock gateway hung")),
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let outcome = {
            let mut state = self.state();
            state.requests.push(request.clone());
            if let Some(previous) = state.by_key.get(request.idempotency_key.as_str()) {
                return previous.clone();
            }
            let fallback = state.fallback.clone().unwrap_or(ScriptedOutcome::Succeed);
            state.script.pop_front().unwrap_or(fallback)
        };

        if matches!(outcome, ScriptedOutcome::Hang) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut state = self.state();
        let transaction_id = format!("pi_mock_{}", state.by_key.len() + 1);
        let result = answer(outcome, transaction_id);
        if result.is_ok() {
            state.real_charges += 1;
        }
        state
            .by_key
            .insert(request.idempotency_key.as_str().to_string(), result.clone());
        result
    }

    async fn resolve_default_method(
        &self,
        gateway_customer_id: &str,
        preferred: Option<&str>,
    ) -> Result<Option<PaymentMethodRef>, GatewayError> {
        let mut state = self.state();
        state.lookups += 1;
        if let Some(e) = &state.lookup_error {
            return Err(e.clone());
        }
        let methods = state
            .methods
            .get(gateway_customer_id)
            .cloned()
            .unwrap_or_default();
        Ok(select_default_method(preferred, methods))
    }
}
