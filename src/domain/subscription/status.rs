//! Subscription status state machine.
//!
//! Defines the lifecycle states of a billed subscription and the valid
//! transitions between them.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriptionStatus {
    /// Billing normally on its schedule.
    Active,

    /// Temporarily excluded from billing by the customer or an operator.
    Paused,

    /// A renewal payment failed; retries run inside the grace period.
    OnHold,

    /// Permanently stopped. Terminal.
    Cancelled,

    /// Reached its natural end. Terminal.
    Expired,
}

impl SubscriptionStatus {
    /// Storage label, matching the legacy commerce system's status names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::OnHold => "on-hold",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "paused" => Ok(SubscriptionStatus::Paused),
            "on-hold" | "on_hold" => Ok(SubscriptionStatus::OnHold),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Active, Paused)
                | (Active, OnHold)
                | (Active, Cancelled)
                | (Active, Expired)
                | (Active, Active) // Renewal
                | (Paused, Active)
                | (Paused, Cancelled)
                | (OnHold, Active) // Successful retry
                | (OnHold, OnHold) // Further failed retry
                | (OnHold, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Active => vec![Paused, OnHold, Cancelled, Expired, Active],
            Paused => vec![Active, Cancelled],
            OnHold => vec![Active, OnHold, Cancelled],
            Cancelled | Expired => vec![],
        }
    }
}
