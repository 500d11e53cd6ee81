//! PostgreSQL implementation of AuditStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use super::{corrupt, db_error};
use crate::domain::audit::{Actor, AuditAction, AuditEntry, RequestOrigin};
use crate::domain::foundation::{AuditEntryId, DomainError, SubscriptionId, Timestamp};
use crate::ports::AuditStore;

pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    subscription_id: i64,
    action: String,
    actor_type: String,
    user_id: Option<i64>,
    user_name: Option<String>,
    description: String,
    old_values: Value,
    new_values: Value,
    metadata: Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action: AuditAction = row.action.parse().map_err(|e| corrupt("action", e))?;

        let actor = match (row.actor_type.as_str(), row.user_id) {
            ("system", _) => Actor::System,
            ("operator", Some(user_id)) => Actor::Operator {
                user_id,
                name: row.user_name.unwrap_or_default(),
            },
            (other, _) => return Err(corrupt("actor_type", format!("unexpected actor '{}'", other))),
        };

        let origin = match (row.ip_address, row.user_agent) {
            (None, None) => None,
            (ip_address, user_agent) => Some(RequestOrigin {
                ip_address,
                user_agent,
            }),
        };

        Ok(AuditEntry {
            id: AuditEntryId::from_uuid(row.id),
            subscription_id: SubscriptionId::new(row.subscription_id)
                .map_err(|e| corrupt("subscription_id", e))?,
            action,
            actor,
            description: row.description,
            old_values: row.old_values,
            new_values: row.new_values,
            metadata: row.metadata,
            origin,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

/// Inserts one audit row on any executor, so the subscription repository
/// can share its transaction.
pub(super) async fn insert_audit_entry<'e, E>(executor: E, entry: &AuditEntry) -> Result<(), DomainError>
where
    E: Executor<'e, Database = Postgres>,
{
    let actor_type = match entry.actor {
        Actor::System => "system",
        Actor::Operator { .. } => "operator",
    };
    let (ip_address, user_agent) = match &entry.origin {
        Some(origin) => (origin.ip_address.clone(), origin.user_agent.clone()),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO subscription_audits (
            id, subscription_id, action, actor_type, user_id, user_name, description,
            old_values, new_values, metadata, ip_address, user_agent, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.subscription_id.as_i64())
    .bind(entry.action.as_str())
    .bind(actor_type)
    .bind(entry.actor.user_id())
    .bind(match &entry.actor {
        Actor::System => None,
        Actor::Operator { name, .. } => Some(name.as_str()),
    })
    .bind(&entry.description)
    .bind(&entry.old_values)
    .bind(&entry.new_values)
    .bind(&entry.metadata)
    .bind(ip_address)
    .bind(user_agent)
    .bind(entry.created_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| db_error("Failed to insert audit entry", e))?;

    Ok(())
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DomainError> {
        insert_audit_entry(&self.pool, entry).await
    }

    async fn entries_for(&self, subscription_id: SubscriptionId) -> Result<Vec<AuditEntry>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, action, actor_type, user_id, user_name, description,
                   old_values, new_values, metadata, ip_address, user_agent, created_at
            FROM subscription_audits
            WHERE subscription_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(subscription_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load audit history", e))?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}
