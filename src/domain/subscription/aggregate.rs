//! Subscription aggregate entity.
//!
//! The Subscription is the unit of mutation of the renewal engine. Every
//! method here is a pure state change; persistence, auditing and
//! notification are the application layer's job.
//!
//! # Design Decisions
//!
//! - **Money in minor units**: price is held as [`Money`], never floats
//! - **Ownership resolved once**: legacy vs native billing is a tagged enum
//! - **Grace clock starts once**: only the first failure sets
//!   `grace_period_ends_at`; later failures never move it
//! - **Clock is a parameter**: mutations take `now` so callers and tests
//!   control time

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

use crate::domain::foundation::{Money, StateMachine, SubscriptionId, Timestamp};

use super::{BillingFrequency, BillingOwnership, SubscriptionError, SubscriptionStatus};

/// Reason recorded when a lapsed grace period cancels a subscription.
pub const GRACE_EXPIRED_REASON: &str = "grace period expired";

/// Subscription aggregate.
///
/// # Invariants
///
/// - `ownership` never changes after load
/// - `failed_payment_count` is zero whenever the last renewal succeeded
/// - `grace_period_ends_at` is set iff there are unresolved failures
/// - Status transitions follow [`SubscriptionStatus`] rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,

    /// `None` when the stored record references neither billing owner.
    pub ownership: Option<BillingOwnership>,

    /// Plan label used in charge descriptions.
    pub plan_name: Option<String>,

    pub price: Money,
    pub frequency: BillingFrequency,
    pub next_billing_at: NaiveDate,

    /// Day of month that month and year intervals return to after being
    /// clamped by a shorter month.
    pub billing_anchor_day: u32,
    pub status: SubscriptionStatus,

    pub is_paused: bool,
    pub paused_until: Option<NaiveDate>,

    /// Dates excluded from billing and delivery.
    pub skipped_dates: BTreeSet<NaiveDate>,

    pub failed_payment_count: u32,
    pub last_payment_date: Option<Timestamp>,
    pub next_retry_at: Option<Timestamp>,
    pub grace_period_ends_at: Option<Timestamp>,

    /// Free-text note, holds the cancellation reason.
    pub status_notes: Option<String>,
    pub cancelled_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates an active subscription due on `next_billing_at`.
    pub fn create(
        id: SubscriptionId,
        ownership: Option<BillingOwnership>,
        price: Money,
        frequency: BillingFrequency,
        next_billing_at: NaiveDate,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            ownership,
            plan_name: None,
            price,
            frequency,
            next_billing_at,
            billing_anchor_day: next_billing_at.day(),
            status: SubscriptionStatus::Active,
            is_paused: false,
            paused_until: None,
            skipped_dates: BTreeSet::new(),
            failed_payment_count: 0,
            last_payment_date: None,
            next_retry_at: None,
            grace_period_ends_at: None,
            status_notes: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Paused by flag, or by a pause date still in the future.
    pub fn is_effectively_paused(&self, today: NaiveDate) -> bool {
        self.is_paused || self.paused_until.map(|d| d > today).unwrap_or(false)
    }

    pub fn is_date_skipped(&self, date: NaiveDate) -> bool {
        self.skipped_dates.contains(&date)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// On hold with a retry time that has arrived.
    pub fn is_retry_due(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::OnHold
            && self.next_retry_at.map(|at| !at.is_after(&now)).unwrap_or(false)
    }

    /// On hold with a grace period that ended strictly before `now`.
    pub fn is_grace_lapsed(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::OnHold
            && self
                .grace_period_ends_at
                .map(|ends| ends.is_before(&now))
                .unwrap_or(false)
    }

    /// Checks the subscription can be billed and returns its owner.
    ///
    /// # Errors
    ///
    /// `AlreadyTerminal`, `NoBillingTarget` or `Paused`, in that order.
    pub fn ensure_billable(&self, today: NaiveDate) -> Result<&BillingOwnership, SubscriptionError> {
        self.ensure_not_terminal()?;
        let ownership = self
            .ownership
            .as_ref()
            .ok_or(SubscriptionError::NoBillingTarget(self.id))?;
        if self.is_effectively_paused(today) {
            return Err(SubscriptionError::Paused(self.id));
        }
        Ok(ownership)
    }

    /// Adds a date to the skip set. Returns false if it was already present.
    pub fn skip_date(&mut self, date: NaiveDate, now: Timestamp) -> Result<bool, SubscriptionError> {
        self.ensure_not_terminal()?;
        let inserted = self.skipped_dates.insert(date);
        if inserted {
            self.updated_at = now;
        }
        Ok(inserted)
    }

    /// Removes a date from the skip set. Returns false if it was absent.
    pub fn unskip_date(&mut self, date: NaiveDate, now: Timestamp) -> Result<bool, SubscriptionError> {
        self.ensure_not_terminal()?;
        let removed = self.skipped_dates.remove(&date);
        if removed {
            self.updated_at = now;
        }
        Ok(removed)
    }

    /// Pauses billing until `until`. Returns false if already paused to that date.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if `until` is not after today, `InvalidState` if
    /// the subscription is on hold.
    pub fn pause_until(&mut self, until: NaiveDate, now: Timestamp) -> Result<bool, SubscriptionError> {
        self.ensure_not_terminal()?;
        if until <= now.date() {
            return Err(SubscriptionError::validation(
                "paused_until",
                format!("pause date {} must be in the future", until),
            ));
        }
        if self.status == SubscriptionStatus::Paused
            && self.is_paused
            && self.paused_until == Some(until)
        {
            return Ok(false);
        }
        if self.status != SubscriptionStatus::Paused {
            self.transition_to(SubscriptionStatus::Paused, "pause")?;
        }
        self.is_paused = true;
        self.paused_until = Some(until);
        self.updated_at = now;
        Ok(true)
    }

    /// Clears both pause fields. Returns false if nothing was paused.
    pub fn resume(&mut self, now: Timestamp) -> Result<bool, SubscriptionError> {
        self.ensure_not_terminal()?;
        let paused_status = self.status == SubscriptionStatus::Paused;
        if !paused_status && !self.is_paused && self.paused_until.is_none() {
            return Ok(false);
        }
        if paused_status {
            self.transition_to(SubscriptionStatus::Active, "resume")?;
        }
        self.is_paused = false;
        self.paused_until = None;
        self.updated_at = now;
        Ok(true)
    }

    /// Cancels the subscription. Terminal.
    pub fn cancel(&mut self, reason: Option<String>, now: Timestamp) -> Result<(), SubscriptionError> {
        self.ensure_not_terminal()?;
        self.transition_to(SubscriptionStatus::Cancelled, "cancel")?;
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            self.status_notes = Some(reason);
        }
        self.next_retry_at = None;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Applies a successful renewal and moves to the next cycle.
    pub fn record_renewal_success(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        self.transition_to(SubscriptionStatus::Active, "renew")?;
        self.failed_payment_count = 0;
        self.next_retry_at = None;
        self.grace_period_ends_at = None;
        self.last_payment_date = Some(now);
        self.advance_billing_date()?;
        self.updated_at = now;
        Ok(())
    }

    /// Applies a failed renewal. The billing date is left in place so a
    /// retry reuses the same cycle.
    pub fn record_renewal_failure(
        &mut self,
        next_retry_at: Option<Timestamp>,
        grace_period: Duration,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        self.transition_to(SubscriptionStatus::OnHold, "place on hold")?;
        self.failed_payment_count = self.failed_payment_count.saturating_add(1);
        self.next_retry_at = next_retry_at;
        if self.grace_period_ends_at.is_none() {
            self.grace_period_ends_at = Some(now.plus(grace_period));
        }
        self.updated_at = now;
        Ok(())
    }

    /// Passes over a cycle whose billing date is in the skip set.
    pub fn record_skipped_cycle(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        self.ensure_not_terminal()?;
        self.advance_billing_date()?;
        self.updated_at = now;
        Ok(())
    }

    /// Moves `next_billing_at` forward one period, past any skipped dates.
    pub fn advance_billing_date(&mut self) -> Result<NaiveDate, SubscriptionError> {
        let anchor = self.billing_anchor_day;
        let mut next = self.frequency.advance_anchored(self.next_billing_at, anchor)?;
        while self.skipped_dates.contains(&next) {
            next = self.frequency.advance_anchored(next, anchor)?;
        }
        self.next_billing_at = next;
        Ok(next)
    }

    /// Rolls `next_billing_at` forward until it is after `today`.
    ///
    /// Returns true if the date moved.
    pub fn roll_forward_past(&mut self, today: NaiveDate) -> Result<bool, SubscriptionError> {
        let mut moved = false;
        while self.next_billing_at <= today || self.skipped_dates.contains(&self.next_billing_at) {
            self.next_billing_at = self
                .frequency
                .advance_anchored(self.next_billing_at, self.billing_anchor_day)?;
            moved = true;
        }
        Ok(moved)
    }

    /// Snapshot of the mutable billing state, for audit old/new values.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "status": self.status.as_str(),
            "next_billing_at": self.next_billing_at,
            "is_paused": self.is_paused,
            "paused_until": self.paused_until,
            "skipped_dates": self.skipped_dates,
            "failed_payment_count": self.failed_payment_count,
            "last_payment_date": self.last_payment_date,
            "next_retry_at": self.next_retry_at,
            "grace_period_ends_at": self.grace_period_ends_at,
            "status_notes": self.status_notes,
        })
    }

    fn ensure_not_terminal(&self) -> Result<(), SubscriptionError> {
        if self.status.is_terminal() {
            return Err(SubscriptionError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn transition_to(&mut self, target: SubscriptionStatus, attempted: &str) -> Result<(), SubscriptionError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| SubscriptionError::invalid_state(self.status, attempted))?;
        Ok(())
    }
}
