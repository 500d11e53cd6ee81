//! Subscription domain module.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate entity
//! - `status` - SubscriptionStatus state machine
//! - `ownership` - Legacy vs native billing owner
//! - `frequency` - Billing interval arithmetic
//! - `retry_policy` - Retry and grace-period policy
//! - `errors` - SubscriptionError

mod aggregate;
mod errors;
mod frequency;
mod ownership;
mod retry_policy;
mod status;

pub use aggregate::{Subscription, GRACE_EXPIRED_REASON};
pub use errors::SubscriptionError;
pub use frequency::{BillingFrequency, BillingInterval};
pub use ownership::{BillingOwnership, NativeCustomer};
pub use retry_policy::{BackoffRetryPolicy, RetryPolicy};
pub use status::SubscriptionStatus;
