//! Billing domain module.
//!
//! Charge outcomes, idempotency keys and customer-facing failure messages.

mod charge;
pub mod customer_message;
mod idempotency;

pub use charge::{
    ChargeChannel, ChargeFailure, ChargeRecord, ChargeResult, ChargeStatus, FailureClass,
    AUTHENTICATION_REQUIRED, CARD_DECLINED, GATEWAY_ERROR, GATEWAY_PENDING, GATEWAY_TIMEOUT,
    NO_PAYMENT_METHOD, NO_PAYMENT_METHOD_MESSAGE,
};
pub use customer_message::customer_message;
pub use idempotency::{legacy_transaction_id, IdempotencyKey};
