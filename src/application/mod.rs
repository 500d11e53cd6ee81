//! Application layer - Components, Commands, Queries, and Handlers.
//!
//! The components own one concern each and sit directly on the ports:
//! - `Scheduler` - due actions in the legacy queue
//! - `PaymentProcessor` - one idempotent charge attempt
//! - `AuditLog` - append and read the audit trail
//!
//! The handlers orchestrate them per command, following CQRS.

mod audit_log;
pub mod handlers;
mod payment_processor;
mod scheduler;

pub use audit_log::{AuditError, AuditLog};
pub use handlers::*;
pub use payment_processor::{PaymentProcessor, DEFAULT_GATEWAY_TIMEOUT};
pub use scheduler::{Scheduler, SchedulerError, DEFAULT_PAYMENT_HOOK};
