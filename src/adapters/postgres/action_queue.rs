//! PostgreSQL implementation of ActionQueue.
//!
//! Reads and writes the legacy commerce system's `scheduled_actions` table.
//! Subscription filtering compares the stored argument blob with the exact
//! blob the engine writes, the same way the legacy system matches rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{corrupt, db_error};
use crate::domain::foundation::{ActionId, DomainError, ErrorCode, Timestamp};
use crate::domain::scheduling::{ActionArgs, ActionStatus, NewQueuedAction, QueuedAction};
use crate::ports::{ActionFilter, ActionQueue, ActionUpdate};

pub struct PostgresActionQueue {
    pool: PgPool,
}

impl PostgresActionQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActionRow {
    action_id: i64,
    hook: String,
    status: String,
    scheduled_date_gmt: DateTime<Utc>,
    args: String,
    last_attempt_gmt: Option<DateTime<Utc>>,
}

impl TryFrom<ActionRow> for QueuedAction {
    type Error = DomainError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        Ok(QueuedAction {
            id: ActionId::from_i64(row.action_id),
            hook: row.hook,
            args: row.args,
            scheduled_at: Timestamp::from_datetime(row.scheduled_date_gmt),
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            last_attempt_at: row.last_attempt_gmt.map(Timestamp::from_datetime),
        })
    }
}

/// Bind values shared by select and delete.
fn filter_binds(filter: &ActionFilter) -> (Option<String>, Option<&'static str>) {
    (
        filter
            .subscription_id
            .map(|id| ActionArgs::for_subscription(id).to_json()),
        filter.status.map(|s| s.as_str()),
    )
}

#[async_trait]
impl ActionQueue for PostgresActionQueue {
    async fn insert(&self, action: NewQueuedAction) -> Result<ActionId, DomainError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO scheduled_actions (hook, status, scheduled_date_gmt, args)
            VALUES ($1, $2, $3, $4)
            RETURNING action_id
            "#,
        )
        .bind(&action.hook)
        .bind(action.status.as_str())
        .bind(action.scheduled_at.as_datetime())
        .bind(&action.args)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert scheduled action", e))?;

        Ok(ActionId::from_i64(id))
    }

    async fn update(&self, id: ActionId, update: ActionUpdate) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_actions SET
                scheduled_date_gmt = COALESCE($2, scheduled_date_gmt),
                status = COALESCE($3, status),
                last_attempt_gmt = COALESCE($4, last_attempt_gmt)
            WHERE action_id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(update.scheduled_at.map(|t| *t.as_datetime()))
        .bind(update.status.map(|s: ActionStatus| s.as_str()))
        .bind(update.last_attempt_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update scheduled action", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::ActionNotFound,
                format!("Scheduled action {} not found", id.as_i64()),
            ));
        }

        Ok(())
    }

    async fn delete_matching(&self, filter: &ActionFilter) -> Result<u64, DomainError> {
        let (args, status) = filter_binds(filter);
        let result = sqlx::query(
            r#"
            DELETE FROM scheduled_actions
            WHERE hook = $1
              AND ($2::text IS NULL OR args = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(&filter.hook)
        .bind(args)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete scheduled actions", e))?;

        Ok(result.rows_affected())
    }

    async fn select_matching(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError> {
        let (args, status) = filter_binds(filter);
        let rows: Vec<ActionRow> = sqlx::query_as(
            r#"
            SELECT action_id, hook, status, scheduled_date_gmt, args, last_attempt_gmt
            FROM scheduled_actions
            WHERE hook = $1
              AND ($2::text IS NULL OR args = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY scheduled_date_gmt ASC, action_id ASC
            "#,
        )
        .bind(&filter.hook)
        .bind(args)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to select scheduled actions", e))?;

        rows.into_iter().map(QueuedAction::try_from).collect()
    }
}
