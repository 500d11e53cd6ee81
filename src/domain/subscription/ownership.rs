//! Billing ownership of a subscription.
//!
//! A subscription is billed either by the legacy commerce system (and only
//! mirrored here) or natively by this engine. The variant is resolved once
//! when the record is loaded and never changes afterwards.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::CustomerId;

/// Customer details needed to charge a natively billed subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCustomer {
    /// Back-office customer record.
    pub customer_id: CustomerId,

    /// Customer reference at the card gateway (`cus_...`), if one was created.
    pub gateway_customer_id: Option<String>,

    /// Payment method the customer explicitly marked as default, if any.
    pub default_payment_method_id: Option<String>,
}

/// Who collects payment for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingOwnership {
    /// Billed by the legacy commerce system. Charging here is record-only.
    LegacyBilled { legacy_user_id: i64 },

    /// Billed directly by this engine through the card gateway.
    NativelyBilled { customer: NativeCustomer },
}

impl BillingOwnership {
    /// Resolves ownership from the raw references on a stored record.
    ///
    /// A legacy user reference wins when both are present. Returns `None`
    /// when the record references neither.
    pub fn from_refs(legacy_user_id: Option<i64>, customer: Option<NativeCustomer>) -> Option<Self> {
        match (legacy_user_id, customer) {
            (Some(legacy_user_id), _) => Some(BillingOwnership::LegacyBilled { legacy_user_id }),
            (None, Some(customer)) => Some(BillingOwnership::NativelyBilled { customer }),
            (None, None) => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, BillingOwnership::LegacyBilled { .. })
    }

    /// Storage label for the ownership tag.
    pub fn label(&self) -> &'static str {
        match self {
            BillingOwnership::LegacyBilled { .. } => "legacy_billed",
            BillingOwnership::NativelyBilled { .. } => "natively_billed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> NativeCustomer {
        NativeCustomer {
            customer_id: CustomerId::from_i64(7),
            gateway_customer_id: Some("cus_7".to_string()),
            default_payment_method_id: None,
        }
    }

    #[test]
    fn legacy_reference_takes_precedence() {
        let ownership = BillingOwnership::from_refs(Some(99), Some(customer())).unwrap();
        assert!(ownership.is_legacy());
        assert_eq!(ownership.label(), "legacy_billed");
    }

    #[test]
    fn native_customer_without_legacy_ref() {
        let ownership = BillingOwnership::from_refs(None, Some(customer())).unwrap();
        assert!(!ownership.is_legacy());
    }

    #[test]
    fn no_reference_resolves_to_none() {
        assert!(BillingOwnership::from_refs(None, None).is_none());
    }
}
