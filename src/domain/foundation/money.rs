//! Money value object.
//!
//! All monetary values are held as integer minor units (pence, cents) with
//! an ISO 4217 currency code. Decimal prices coming from the back office are
//! parsed once at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Three-letter ISO 4217 currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validates and normalises a currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("expected a three-letter code, got '{}'", code),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Pound sterling, the back office default.
    pub fn gbp() -> Self {
        Self("GBP".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form expected by the card gateway.
    pub fn to_gateway_code(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative amount in minor units of a currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: i64,
    currency: Currency,
}

impl Money {
    /// Creates money from minor units, rejecting negative amounts.
    pub fn from_minor(minor_units: i64, currency: Currency) -> Result<Self, ValidationError> {
        if minor_units < 0 {
            return Err(ValidationError::out_of_range(
                "price",
                0,
                i64::MAX,
                minor_units,
            ));
        }
        Ok(Self {
            minor_units,
            currency,
        })
    }

    /// Parses a decimal major-unit string such as `"12.50"`.
    ///
    /// Digits past the second decimal place are rounded half-up.
    pub fn parse_decimal(value: &str, currency: Currency) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::empty_field("price"));
        }
        if value.starts_with('-') {
            return Err(ValidationError::invalid_format(
                "price",
                "price cannot be negative",
            ));
        }

        let (whole, fraction) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };
        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
            return Err(ValidationError::invalid_format(
                "price",
                format!("'{}' is not a decimal amount", value),
            ));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ValidationError::invalid_format("price", "amount too large"))?
        };

        let mut digits = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = digits.next().unwrap_or(0);
        let hundredths = digits.next().unwrap_or(0);
        let round_up = digits.next().map(|d| d >= 5).unwrap_or(false);

        let minor = whole
            .checked_mul(100)
            .and_then(|m| m.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(|| ValidationError::invalid_format("price", "amount too large"))?;

        Self::from_minor(minor, currency)
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Amount to submit to the gateway: never below one minor unit.
    pub fn charge_amount(&self) -> i64 {
        self.minor_units.max(1)
    }

    /// Decimal string with two places, e.g. `12.50`.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.minor_units / 100, self.minor_units % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbp() -> Currency {
        Currency::gbp()
    }

    #[test]
    fn parses_two_decimal_places() {
        let money = Money::parse_decimal("12.50", gbp()).unwrap();
        assert_eq!(money.minor_units(), 1250);
    }

    #[test]
    fn parses_whole_and_single_decimal() {
        assert_eq!(Money::parse_decimal("20", gbp()).unwrap().minor_units(), 2000);
        assert_eq!(Money::parse_decimal("3.5", gbp()).unwrap().minor_units(), 350);
        assert_eq!(Money::parse_decimal(".99", gbp()).unwrap().minor_units(), 99);
    }

    #[test]
    fn rounds_half_up_at_third_decimal() {
        assert_eq!(Money::parse_decimal("12.505", gbp()).unwrap().minor_units(), 1251);
        assert_eq!(Money::parse_decimal("12.504", gbp()).unwrap().minor_units(), 1250);
        assert_eq!(Money::parse_decimal("0.999", gbp()).unwrap().minor_units(), 100);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(Money::parse_decimal("-1.00", gbp()).is_err());
        assert!(Money::parse_decimal("abc", gbp()).is_err());
        assert!(Money::parse_decimal("1.2.3", gbp()).is_err());
        assert!(Money::parse_decimal("", gbp()).is_err());
        assert!(Money::from_minor(-5, gbp()).is_err());
    }

    #[test]
    fn charge_amount_is_at_least_one_minor_unit() {
        assert_eq!(Money::from_minor(0, gbp()).unwrap().charge_amount(), 1);
        assert_eq!(Money::from_minor(1250, gbp()).unwrap().charge_amount(), 1250);
    }

    #[test]
    fn currency_normalises_to_upper_case() {
        let currency = Currency::new("gbp").unwrap();
        assert_eq!(currency.as_str(), "GBP");
        assert_eq!(currency.to_gateway_code(), "gbp");
        assert!(Currency::new("pounds").is_err());
        assert!(Currency::new("").is_err());
    }

    #[test]
    fn displays_decimal_with_currency() {
        let money = Money::from_minor(1205, gbp()).unwrap();
        assert_eq!(money.to_string(), "12.05 GBP");
    }

    #[test]
    fn currency_deserializes_with_validation() {
        let ok: Currency = serde_json::from_str("\"eur\"").unwrap();
        assert_eq!(ok.as_str(), "EUR");
        assert!(serde_json::from_str::<Currency>("\"euro\"").is_err());
    }
}
