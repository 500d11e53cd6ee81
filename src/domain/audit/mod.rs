//! Audit domain module.

mod entry;

pub use entry::{Actor, AuditAction, AuditContext, AuditEntry, RequestOrigin};
