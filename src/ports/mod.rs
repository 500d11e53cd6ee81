//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `SubscriptionRepository` - Subscription state, committed with its audit entry
//! - `AuditStore` - Append-only audit trail
//! - `ActionQueue` - Legacy durable queue of due billing actions
//! - `RenewalLedger` - Charge, renewal-order and refund-credit records
//!
//! ## External Service Ports
//!
//! - `PaymentGateway` - Card charging and payment method lookup
//! - `Notifier` - Customer notifications

mod action_queue;
mod audit_store;
mod notifier;
mod payment_gateway;
mod renewal_ledger;
mod subscription_repository;

pub use action_queue::{ActionFilter, ActionQueue, ActionUpdate};
pub use audit_store::AuditStore;
pub use notifier::{Notifier, RenewalNotice, RetryInfo};
pub use payment_gateway::{
    select_default_method, ChargeRequest, GatewayCharge, GatewayChargeStatus, GatewayError,
    GatewayErrorCode, PaymentGateway, PaymentMethodRef,
};
pub use renewal_ledger::{RefundRecord, RenewalLedger, RenewalRecord};
pub use subscription_repository::SubscriptionRepository;
