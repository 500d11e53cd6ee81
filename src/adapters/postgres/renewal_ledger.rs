//! PostgreSQL implementation of RenewalLedger.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{corrupt, db_error};
use crate::domain::billing::ChargeRecord;
use crate::domain::foundation::{Currency, DomainError, ErrorCode, Money};
use crate::ports::{RefundRecord, RenewalLedger, RenewalRecord};

pub struct PostgresRenewalLedger {
    pool: PgPool,
}

impl PostgresRenewalLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RenewalLedger for PostgresRenewalLedger {
    async fn record_charge(&self, record: &ChargeRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO charge_records (
                subscription_id, idempotency_key, transaction_id, amount_minor, currency,
                status, error_code, channel, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.subscription_id.as_i64())
        .bind(record.idempotency_key.as_str())
        .bind(&record.transaction_id)
        .bind(record.amount.minor_units())
        .bind(record.amount.currency().as_str())
        .bind(record.status.as_str())
        .bind(&record.error_code)
        .bind(record.channel.as_str())
        .bind(record.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record charge", e))?;

        Ok(())
    }

    async fn record_renewal(&self, record: &RenewalRecord) -> Result<(), DomainError> {
        // Order numbers have second precision; a replay in the same second
        // is the same order.
        sqlx::query(
            r#"
            INSERT INTO renewal_records (
                order_number, subscription_id, amount_minor, currency, transaction_id,
                channel, billing_date, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_number) DO NOTHING
            "#,
        )
        .bind(&record.order_number)
        .bind(record.subscription_id.as_i64())
        .bind(record.amount.minor_units())
        .bind(record.amount.currency().as_str())
        .bind(&record.transaction_id)
        .bind(record.channel.as_str())
        .bind(record.billing_date)
        .bind(record.completed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record renewal order", e))?;

        Ok(())
    }

    async fn credit_refund(&self, record: &RefundRecord) -> Result<Money, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin refund transaction", e))?;

        // A balance row in another currency is left untouched by the upsert.
        let balance: Option<(i64, String)> = sqlx::query_as(
            r#"
            INSERT INTO account_funds (customer_id, balance_minor, currency, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id) DO UPDATE SET
                balance_minor = account_funds.balance_minor + EXCLUDED.balance_minor,
                updated_at = EXCLUDED.updated_at
            WHERE account_funds.currency = EXCLUDED.currency
            RETURNING balance_minor, currency
            "#,
        )
        .bind(record.customer_id.as_i64())
        .bind(record.amount.minor_units())
        .bind(record.amount.currency().as_str())
        .bind(record.created_at.as_datetime())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to credit account funds", e))?;

        let Some((balance_minor, currency)) = balance else {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "Account {} holds funds in another currency than {}",
                    record.customer_id,
                    record.amount.currency()
                ),
            ));
        };

        sqlx::query(
            r#"
            INSERT INTO refund_records (
                transaction_id, subscription_id, customer_id, amount_minor, currency,
                reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.transaction_id)
        .bind(record.subscription_id.as_i64())
        .bind(record.customer_id.as_i64())
        .bind(record.amount.minor_units())
        .bind(record.amount.currency().as_str())
        .bind(&record.reason)
        .bind(record.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to record refund", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit refund", e))?;

        let currency: Currency = currency.trim().parse().map_err(|e| corrupt("currency", e))?;
        Money::from_minor(balance_minor, currency).map_err(|e| corrupt("balance_minor", e))
    }
}
