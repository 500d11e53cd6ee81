//! Billing frequency: an interval unit times a multiplier.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Largest multiplier accepted for any interval.
pub const MAX_MULTIPLIER: u32 = 52;

/// Unit of a billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Week,
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "weekly" => Ok(BillingInterval::Week),
            "month" | "monthly" => Ok(BillingInterval::Month),
            "year" | "yearly" | "annual" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "billing_interval",
                format!("unknown interval '{}'", other),
            )),
        }
    }
}

/// How often a subscription is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingFrequency {
    interval: BillingInterval,
    multiplier: u32,
}

impl BillingFrequency {
    /// Creates a frequency, validating the multiplier.
    pub fn new(interval: BillingInterval, multiplier: u32) -> Result<Self, ValidationError> {
        if multiplier == 0 || multiplier > MAX_MULTIPLIER {
            return Err(ValidationError::out_of_range(
                "billing_multiplier",
                1,
                i64::from(MAX_MULTIPLIER),
                i64::from(multiplier),
            ));
        }
        Ok(Self {
            interval,
            multiplier,
        })
    }

    pub fn weekly() -> Self {
        Self {
            interval: BillingInterval::Week,
            multiplier: 1,
        }
    }

    pub fn fortnightly() -> Self {
        Self {
            interval: BillingInterval::Week,
            multiplier: 2,
        }
    }

    pub fn monthly() -> Self {
        Self {
            interval: BillingInterval::Month,
            multiplier: 1,
        }
    }

    pub fn interval(&self) -> BillingInterval {
        self.interval
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Returns the billing date one period after `date`, anchored on the
    /// day of `date` itself.
    pub fn advance(&self, date: NaiveDate) -> Result<NaiveDate, ValidationError> {
        self.advance_anchored(date, date.day())
    }

    /// Returns the billing date one period after `date`.
    ///
    /// Month and year intervals land on `anchor_day`, clamped to the last
    /// day of a shorter month: with anchor 31, 31 Jan -> 28 Feb -> 31 Mar.
    /// Weekly intervals ignore the anchor.
    pub fn advance_anchored(
        &self,
        date: NaiveDate,
        anchor_day: u32,
    ) -> Result<NaiveDate, ValidationError> {
        let months = match self.interval {
            BillingInterval::Week => {
                return date
                    .checked_add_days(Days::new(7 * u64::from(self.multiplier)))
                    .ok_or_else(out_of_range);
            }
            BillingInterval::Month => self.multiplier,
            BillingInterval::Year => 12 * self.multiplier,
        };
        date.with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(months)))
            .and_then(|first| {
                let last = last_day_of_month(first)?;
                first.with_day(anchor_day.clamp(1, last))
            })
            .ok_or_else(out_of_range)
    }
}

fn last_day_of_month(first: NaiveDate) -> Option<u32> {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
}

fn out_of_range() -> ValidationError {
    ValidationError::invalid_format("next_billing_at", "date out of range")
}

impl fmt::Display for BillingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.interval, self.multiplier) {
            (BillingInterval::Week, 1) => f.write_str("weekly"),
            (BillingInterval::Week, 2) => f.write_str("fortnightly"),
            (BillingInterval::Month, 1) => f.write_str("monthly"),
            (BillingInterval::Year, 1) => f.write_str("yearly"),
            (interval, n) => write!(f, "every {} {}s", n, interval.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_and_fortnightly_add_days() {
        assert_eq!(
            BillingFrequency::weekly().advance(date(2025, 1, 1)).unwrap(),
            date(2025, 1, 8)
        );
        assert_eq!(
            BillingFrequency::fortnightly().advance(date(2025, 1, 1)).unwrap(),
            date(2025, 1, 15)
        );
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            BillingFrequency::monthly().advance(date(2025, 1, 31)).unwrap(),
            date(2025, 2, 28)
        );
        assert_eq!(
            BillingFrequency::monthly().advance(date(2024, 1, 31)).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn monthly_returns_to_the_anchor_day_after_a_short_month() {
        let monthly = BillingFrequency::monthly();
        let feb = monthly.advance_anchored(date(2025, 1, 31), 31).unwrap();
        let mar = monthly.advance_anchored(feb, 31).unwrap();
        let apr = monthly.advance_anchored(mar, 31).unwrap();
        assert_eq!((feb, mar, apr), (date(2025, 2, 28), date(2025, 3, 31), date(2025, 4, 30)));
    }

    #[test]
    fn anchor_applies_to_multi_month_and_yearly_intervals() {
        let quarterly = BillingFrequency::new(BillingInterval::Month, 3).unwrap();
        assert_eq!(
            quarterly.advance_anchored(date(2025, 2, 28), 31).unwrap(),
            date(2025, 5, 31)
        );
        let yearly = BillingFrequency::new(BillingInterval::Year, 1).unwrap();
        assert_eq!(yearly.advance_anchored(date(2025, 2, 28), 29).unwrap(), date(2026, 2, 28));
        assert_eq!(yearly.advance_anchored(date(2027, 2, 28), 29).unwrap(), date(2028, 2, 29));
    }

    #[test]
    fn weekly_ignores_the_anchor() {
        assert_eq!(
            BillingFrequency::weekly().advance_anchored(date(2025, 1, 31), 3).unwrap(),
            date(2025, 2, 7)
        );
    }

    #[test]
    fn yearly_advances_twelve_months() {
        let freq = BillingFrequency::new(BillingInterval::Year, 1).unwrap();
        assert_eq!(freq.advance(date(2024, 2, 29)).unwrap(), date(2025, 2, 28));
    }

    #[test]
    fn rejects_zero_multiplier() {
        assert!(BillingFrequency::new(BillingInterval::Week, 0).is_err());
        assert!(BillingFrequency::new(BillingInterval::Week, MAX_MULTIPLIER + 1).is_err());
    }

    #[test]
    fn parses_interval_names() {
        assert_eq!("Weekly".parse::<BillingInterval>(), Ok(BillingInterval::Week));
        assert_eq!("month".parse::<BillingInterval>(), Ok(BillingInterval::Month));
        assert!("daily".parse::<BillingInterval>().is_err());
    }

    #[test]
    fn displays_common_frequencies() {
        assert_eq!(BillingFrequency::fortnightly().to_string(), "fortnightly");
        let every_three = BillingFrequency::new(BillingInterval::Month, 3).unwrap();
        assert_eq!(every_three.to_string(), "every 3 months");
    }
}
