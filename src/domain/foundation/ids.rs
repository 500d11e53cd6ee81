//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Identifier of a billed subscription.
///
/// Subscription ids are assigned by the back office database and are stable
/// for the lifetime of the subscription. They are opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SubscriptionId(i64);

impl SubscriptionId {
    /// Creates a SubscriptionId, rejecting non-positive values.
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::invalid_format(
                "subscription_id",
                format!("must be positive, got {}", id),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the raw database value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for SubscriptionId {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubscriptionId> for i64 {
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().parse::<i64>().map_err(|e| {
            ValidationError::invalid_format("subscription_id", e.to_string())
        })?;
        Self::new(raw)
    }
}

/// Primary key of a row in the durable action queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(i64);

impl ActionId {
    /// Wraps a queue primary key.
    pub fn from_i64(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw primary key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a back-office customer (natively billed subscriptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(i64);

impl CustomerId {
    /// Wraps a customer primary key.
    pub fn from_i64(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw primary key.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    /// Creates a new random AuditEntryId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an AuditEntryId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuditEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_accepts_positive_values() {
        let id = SubscriptionId::new(42).unwrap();
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn subscription_id_rejects_zero_and_negative() {
        assert!(SubscriptionId::new(0).is_err());
        assert!(SubscriptionId::new(-3).is_err());
    }

    #[test]
    fn subscription_id_parses_from_string() {
        let id: SubscriptionId = " 17 ".parse().unwrap();
        assert_eq!(id.as_i64(), 17);
        assert!("abc".parse::<SubscriptionId>().is_err());
    }

    #[test]
    fn subscription_id_serializes_transparently() {
        let id = SubscriptionId::new(9).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "9");
    }

    #[test]
    fn subscription_id_deserialization_validates() {
        let id: SubscriptionId = serde_json::from_str("12").unwrap();
        assert_eq!(id.as_i64(), 12);
        assert!(serde_json::from_str::<SubscriptionId>("0").is_err());
    }

    #[test]
    fn audit_entry_id_generates_unique_values() {
        assert_ne!(AuditEntryId::new(), AuditEntryId::new());
    }

    #[test]
    fn audit_entry_id_roundtrips_through_string() {
        let id = AuditEntryId::new();
        let parsed: AuditEntryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
