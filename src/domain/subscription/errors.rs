//! Subscription-specific error types.
//!
//! | Error | Class |
//! |-------|-------|
//! | NotFound | terminal |
//! | AlreadyTerminal | terminal |
//! | NoBillingTarget | terminal |
//! | Paused | refused, not counted as a failure |
//! | InvalidState | refused |
//! | ValidationFailed | refused |
//! | Storage | fatal |
//! | Scheduling | fatal |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, ValidationError};

use super::SubscriptionStatus;

#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionId),

    #[error("Subscription {id} is already {status}")]
    AlreadyTerminal {
        id: SubscriptionId,
        status: SubscriptionStatus,
    },

    #[error("Subscription {0} has no billing target")]
    NoBillingTarget(SubscriptionId),

    #[error("Subscription {0} is paused")]
    Paused(SubscriptionId),

    #[error("Cannot {attempted} subscription in {current} state")]
    InvalidState {
        current: SubscriptionStatus,
        attempted: String,
    },

    #[error("Validation failed for '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    /// Subscription or audit storage failed. The mutation was not applied.
    #[error("Storage failure: {0}")]
    Storage(DomainError),

    /// The durable action queue failed.
    #[error("Scheduling failure: {0}")]
    Scheduling(String),
}

impl SubscriptionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(current: SubscriptionStatus, attempted: impl Into<String>) -> Self {
        SubscriptionError::InvalidState {
            current,
            attempted: attempted.into(),
        }
    }

    /// Storage or queue unavailability; must be propagated, never swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SubscriptionError::Storage(_) | SubscriptionError::Scheduling(_)
        )
    }

    /// Business refusal that retrying cannot fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionError::NotFound(_)
                | SubscriptionError::AlreadyTerminal { .. }
                | SubscriptionError::NoBillingTarget(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFound(_) => ErrorCode::SubscriptionNotFound,
            SubscriptionError::AlreadyTerminal { .. }
            | SubscriptionError::Paused(_)
            | SubscriptionError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::NoBillingTarget(_) | SubscriptionError::ValidationFailed { .. } => {
                ErrorCode::ValidationFailed
            }
            SubscriptionError::Storage(err) => err.code,
            SubscriptionError::Scheduling(_) => ErrorCode::StorageUnavailable,
        }
    }
}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        SubscriptionError::Storage(err)
    }
}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyField { field } => {
                SubscriptionError::validation(field, "cannot be empty")
            }
            ValidationError::OutOfRange { ref field, .. } => {
                SubscriptionError::validation(field.clone(), err.to_string())
            }
            ValidationError::InvalidFormat { field, reason } => {
                SubscriptionError::validation(field, reason)
            }
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::Storage(inner) => inner,
            other => DomainError::new(other.code(), other.to_string()),
        }
    }
}
