//! UTC instants, and the bridge between them and calendar billing dates.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in time, always UTC.
///
/// Billing dates are [`NaiveDate`]s; a billing date falls due at the start of
/// that day in UTC, see [`Timestamp::start_of_date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Due moment of a billing date: 00:00:00 UTC that day.
    pub fn start_of_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// UTC calendar date, the "today" that billing decisions compare against.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Negative `days` moves backwards.
    pub fn add_days(&self, days: i64) -> Self {
        self.plus(Duration::days(days))
    }

    pub fn minus_days(&self, days: i64) -> Self {
        self.plus(Duration::days(-days))
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        self.plus(Duration::hours(hours))
    }

    pub fn plus_secs(&self, secs: i64) -> Self {
        self.plus(Duration::seconds(secs))
    }

    pub fn plus(&self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn billing_date_falls_due_at_midnight_utc() {
        let due = Timestamp::start_of_date(date(2025, 1, 1));

        assert_eq!(due.as_datetime().hour(), 0);
        assert_eq!(due.as_datetime().minute(), 0);
        assert_eq!(due.date(), date(2025, 1, 1));
    }

    #[test]
    fn day_arithmetic_crosses_month_ends() {
        let base = Timestamp::start_of_date(date(2025, 1, 31));

        assert_eq!(base.add_days(1).date(), date(2025, 2, 1));
        assert_eq!(base.minus_days(31).date(), date(2024, 12, 31));
        assert_eq!(base.add_days(-1), base.minus_days(1));
        assert_eq!(base.plus_hours(23).date(), date(2025, 1, 31));
        assert_eq!(base.plus_hours(24).date(), date(2025, 2, 1));
    }

    #[test]
    fn comparisons_are_strict() {
        let t0 = Timestamp::start_of_date(date(2025, 3, 1));
        let t1 = t0.plus_secs(1);

        assert!(t0.is_before(&t1));
        assert!(t1.is_after(&t0));
        assert!(!t0.is_after(&t0));
        assert!(!t0.is_before(&t0));
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let due = Timestamp::start_of_date(date(2024, 1, 15));

        let json = serde_json::to_string(&due).unwrap();
        assert_eq!(json, "\"2024-01-15T00:00:00Z\"");

        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, due);
    }
}
