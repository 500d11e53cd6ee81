//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `subscription` - Subscription aggregate, lifecycle and retry policy
//! - `billing` - Charge outcomes, idempotency keys, customer messages
//! - `audit` - Audit trail entries
//! - `scheduling` - Due actions of the durable billing queue

pub mod audit;
pub mod billing;
pub mod foundation;
pub mod scheduling;
pub mod subscription;
