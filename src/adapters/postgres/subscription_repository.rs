//! PostgreSQL implementation of SubscriptionRepository.
//!
//! `commit` writes the subscription row and its audit row in one
//! transaction, so state never changes without a matching audit entry.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::PgPool;

use super::audit_store::insert_audit_entry;
use super::{corrupt, db_error};
use crate::domain::audit::AuditEntry;
use crate::domain::foundation::{
    Currency, CustomerId, DomainError, ErrorCode, Money, SubscriptionId, Timestamp,
};
use crate::domain::subscription::{
    BillingFrequency, BillingInterval, BillingOwnership, NativeCustomer, Subscription,
    SubscriptionStatus,
};
use crate::ports::SubscriptionRepository;

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, legacy_user_id, customer_id, gateway_customer_id, default_payment_method_id,
           plan_name, price_minor, currency, billing_interval, billing_multiplier,
           next_billing_at, billing_anchor_day, status, is_paused, paused_until, skipped_dates,
           failed_payment_count, last_payment_date, next_retry_at, grace_period_ends_at,
           status_notes, cancelled_at, created_at, updated_at
    FROM subscriptions
"#;

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    legacy_user_id: Option<i64>,
    customer_id: Option<i64>,
    gateway_customer_id: Option<String>,
    default_payment_method_id: Option<String>,
    plan_name: Option<String>,
    price_minor: i64,
    currency: String,
    billing_interval: String,
    billing_multiplier: i32,
    next_billing_at: NaiveDate,
    billing_anchor_day: Option<i16>,
    status: String,
    is_paused: bool,
    paused_until: Option<NaiveDate>,
    skipped_dates: Vec<NaiveDate>,
    failed_payment_count: i32,
    last_payment_date: Option<DateTime<Utc>>,
    next_retry_at: Option<DateTime<Utc>>,
    grace_period_ends_at: Option<DateTime<Utc>>,
    status_notes: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let id = SubscriptionId::new(row.id).map_err(|e| corrupt("id", e))?;

        let customer = row.customer_id.map(|customer_id| NativeCustomer {
            customer_id: CustomerId::from_i64(customer_id),
            gateway_customer_id: row.gateway_customer_id,
            default_payment_method_id: row.default_payment_method_id,
        });
        let ownership = BillingOwnership::from_refs(row.legacy_user_id, customer);

        let currency: Currency = row.currency.parse().map_err(|e| corrupt("currency", e))?;
        let price = Money::from_minor(row.price_minor, currency).map_err(|e| corrupt("price_minor", e))?;

        let interval: BillingInterval = row
            .billing_interval
            .parse()
            .map_err(|e| corrupt("billing_interval", e))?;
        let multiplier = u32::try_from(row.billing_multiplier)
            .map_err(|_| corrupt("billing_multiplier", "negative multiplier"))?;
        let frequency =
            BillingFrequency::new(interval, multiplier).map_err(|e| corrupt("billing_multiplier", e))?;

        let status: SubscriptionStatus = row.status.parse().map_err(|e| corrupt("status", e))?;

        // Rows written before the anchor was stored anchor on their current date.
        let billing_anchor_day = match row.billing_anchor_day {
            Some(day @ 1..=31) => day as u32,
            Some(day) => return Err(corrupt("billing_anchor_day", format!("day {} out of range", day))),
            None => row.next_billing_at.day(),
        };

        Ok(Subscription {
            id,
            ownership,
            plan_name: row.plan_name,
            price,
            frequency,
            next_billing_at: row.next_billing_at,
            billing_anchor_day,
            status,
            is_paused: row.is_paused,
            paused_until: row.paused_until,
            skipped_dates: row.skipped_dates.into_iter().collect::<BTreeSet<_>>(),
            failed_payment_count: u32::try_from(row.failed_payment_count).unwrap_or(0),
            last_payment_date: row.last_payment_date.map(Timestamp::from_datetime),
            next_retry_at: row.next_retry_at.map(Timestamp::from_datetime),
            grace_period_ends_at: row.grace_period_ends_at.map(Timestamp::from_datetime),
            status_notes: row.status_notes,
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn commit(&self, subscription: &Subscription, entry: &AuditEntry) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        let skipped: Vec<NaiveDate> = subscription.skipped_dates.iter().copied().collect();
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                next_billing_at = $2,
                status = $3,
                is_paused = $4,
                paused_until = $5,
                skipped_dates = $6,
                failed_payment_count = $7,
                last_payment_date = $8,
                next_retry_at = $9,
                grace_period_ends_at = $10,
                status_notes = $11,
                cancelled_at = $12,
                updated_at = $13,
                billing_anchor_day = $14
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_i64())
        .bind(subscription.next_billing_at)
        .bind(subscription.status.as_str())
        .bind(subscription.is_paused)
        .bind(subscription.paused_until)
        .bind(&skipped)
        .bind(i32::try_from(subscription.failed_payment_count).unwrap_or(i32::MAX))
        .bind(subscription.last_payment_date.map(|t| *t.as_datetime()))
        .bind(subscription.next_retry_at.map(|t| *t.as_datetime()))
        .bind(subscription.grace_period_ends_at.map(|t| *t.as_datetime()))
        .bind(&subscription.status_notes)
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime())
        .bind(i16::try_from(subscription.billing_anchor_day).unwrap_or(31))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to update subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", subscription.id),
            ));
        }

        insert_audit_entry(&mut *tx, entry).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        Ok(())
    }

    async fn find_retry_due(&self, now: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'on-hold' AND next_retry_at IS NOT NULL AND next_retry_at <= $1 ORDER BY next_retry_at ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscriptions due for retry", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn find_grace_lapsed(&self, now: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'on-hold' AND grace_period_ends_at IS NOT NULL AND grace_period_ends_at < $1 ORDER BY grace_period_ends_at ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find lapsed subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: 42,
            legacy_user_id: None,
            customer_id: Some(7),
            gateway_customer_id: Some("cus_7".to_string()),
            default_payment_method_id: None,
            plan_name: Some("Large Veg Box".to_string()),
            price_minor: 2250,
            currency: "GBP".to_string(),
            billing_interval: "week".to_string(),
            billing_multiplier: 2,
            next_billing_at: now.date_naive(),
            billing_anchor_day: None,
            status: "on-hold".to_string(),
            is_paused: false,
            paused_until: None,
            skipped_dates: vec![now.date_naive()],
            failed_payment_count: 1,
            last_payment_date: None,
            next_retry_at: Some(now),
            grace_period_ends_at: Some(now),
            status_notes: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_to_natively_billed_subscription() {
        let sub = Subscription::try_from(row()).unwrap();
        assert_eq!(sub.id.as_i64(), 42);
        assert_eq!(sub.status, SubscriptionStatus::OnHold);
        assert_eq!(sub.frequency, BillingFrequency::fortnightly());
        assert_eq!(sub.price.minor_units(), 2250);
        assert!(matches!(sub.ownership, Some(BillingOwnership::NativelyBilled { .. })));
        assert_eq!(sub.skipped_dates.len(), 1);
    }

    #[test]
    fn stored_anchor_day_is_kept_and_missing_one_falls_back_to_the_billing_date() {
        let mut anchored = row();
        anchored.billing_interval = "month".to_string();
        anchored.billing_multiplier = 1;
        anchored.next_billing_at = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        anchored.billing_anchor_day = Some(31);
        assert_eq!(Subscription::try_from(anchored).unwrap().billing_anchor_day, 31);

        let mut legacy_row = row();
        legacy_row.next_billing_at = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        assert_eq!(Subscription::try_from(legacy_row).unwrap().billing_anchor_day, 14);

        let mut corrupt_row = row();
        corrupt_row.billing_anchor_day = Some(40);
        assert!(Subscription::try_from(corrupt_row).is_err());
    }

    #[test]
    fn legacy_reference_wins_over_customer() {
        let mut legacy = row();
        legacy.legacy_user_id = Some(900);
        let sub = Subscription::try_from(legacy).unwrap();
        assert!(sub.ownership.unwrap().is_legacy());
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let mut bad = row();
        bad.status = "wc-pending".to_string();
        let err = Subscription::try_from(bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
