//! Audit entries: the append-only trail of subscription state changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{AuditEntryId, SubscriptionId, Timestamp, ValidationError};

/// What happened to the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RenewalSuccess,
    RenewalFailed,
    RenewalSkipped,
    DateSkipped,
    DateUnskipped,
    Paused,
    Resumed,
    Cancelled,
    GracePeriodExpired,
    Refunded,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RenewalSuccess => "renewal_success",
            AuditAction::RenewalFailed => "renewal_failed",
            AuditAction::RenewalSkipped => "renewal_skipped",
            AuditAction::DateSkipped => "date_skipped",
            AuditAction::DateUnskipped => "date_unskipped",
            AuditAction::Paused => "paused",
            AuditAction::Resumed => "resumed",
            AuditAction::Cancelled => "cancelled",
            AuditAction::GracePeriodExpired => "grace_period_expired",
            AuditAction::Refunded => "refunded",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "renewal_success" => AuditAction::RenewalSuccess,
            "renewal_failed" => AuditAction::RenewalFailed,
            "renewal_skipped" => AuditAction::RenewalSkipped,
            "date_skipped" => AuditAction::DateSkipped,
            "date_unskipped" => AuditAction::DateUnskipped,
            "paused" => AuditAction::Paused,
            "resumed" => AuditAction::Resumed,
            "cancelled" => AuditAction::Cancelled,
            "grace_period_expired" => AuditAction::GracePeriodExpired,
            "refunded" => AuditAction::Refunded,
            other => {
                return Err(ValidationError::invalid_format(
                    "audit_action",
                    format!("unknown action '{}'", other),
                ))
            }
        };
        Ok(action)
    }
}

/// Who caused the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    /// The renewal engine itself (driver, scheduler, grace expiry).
    System,

    /// A named back-office operator.
    Operator { user_id: i64, name: String },
}

impl Actor {
    pub fn operator(user_id: i64, name: impl Into<String>) -> Self {
        Actor::Operator {
            user_id,
            name: name.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Actor::System => "System",
            Actor::Operator { name, .. } => name,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Actor::System => None,
            Actor::Operator { user_id, .. } => Some(*user_id),
        }
    }
}

/// Network context of the request that caused the change, when known.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Who performed a mutation and from where. Passed into every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub actor: Actor,
    pub origin: Option<RequestOrigin>,
}

impl AuditContext {
    pub fn system() -> Self {
        Self {
            actor: Actor::System,
            origin: None,
        }
    }

    pub fn operator(user_id: i64, name: impl Into<String>) -> Self {
        Self {
            actor: Actor::operator(user_id, name),
            origin: None,
        }
    }

    pub fn with_origin(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.origin = Some(RequestOrigin {
            ip_address,
            user_agent,
        });
        self
    }
}

impl Default for AuditContext {
    fn default() -> Self {
        Self::system()
    }
}

/// One immutable line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub subscription_id: SubscriptionId,
    pub action: AuditAction,
    pub actor: Actor,
    pub description: String,
    pub old_values: Value,
    pub new_values: Value,
    pub metadata: Value,
    pub origin: Option<RequestOrigin>,
    pub created_at: Timestamp,
}

impl AuditEntry {
    /// Starts an entry for `action` with empty snapshots.
    pub fn new(
        subscription_id: SubscriptionId,
        action: AuditAction,
        context: &AuditContext,
        description: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            subscription_id,
            action,
            actor: context.actor.clone(),
            description: description.into(),
            old_values: Value::Null,
            new_values: Value::Null,
            metadata: Value::Null,
            origin: context.origin.clone(),
            created_at: now,
        }
    }

    pub fn with_values(mut self, old_values: Value, new_values: Value) -> Self {
        self.old_values = old_values;
        self.new_values = new_values;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_labels_roundtrip() {
        for action in [
            AuditAction::RenewalSuccess,
            AuditAction::RenewalFailed,
            AuditAction::RenewalSkipped,
            AuditAction::DateSkipped,
            AuditAction::DateUnskipped,
            AuditAction::Paused,
            AuditAction::Resumed,
            AuditAction::Cancelled,
            AuditAction::GracePeriodExpired,
            AuditAction::Refunded,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
        assert!("deleted".parse::<AuditAction>().is_err());
    }

    #[test]
    fn entry_captures_actor_and_origin() {
        let ctx = AuditContext::operator(12, "Martin")
            .with_origin(Some("10.0.0.1".to_string()), Some("curl/8".to_string()));
        let entry = AuditEntry::new(
            SubscriptionId::new(4).unwrap(),
            AuditAction::Paused,
            &ctx,
            "Paused until 2025-02-01",
            Timestamp::now(),
        )
        .with_values(json!({"status": "active"}), json!({"status": "paused"}));

        assert_eq!(entry.actor.display_name(), "Martin");
        assert_eq!(entry.actor.user_id(), Some(12));
        assert_eq!(
            entry.origin.as_ref().and_then(|o| o.ip_address.as_deref()),
            Some("10.0.0.1")
        );
        assert_eq!(entry.new_values["status"], "paused");
    }

    #[test]
    fn system_context_has_no_origin() {
        let ctx = AuditContext::default();
        assert_eq!(ctx.actor, Actor::System);
        assert!(ctx.origin.is_none());
    }
}
