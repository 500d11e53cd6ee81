//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresSubscriptionRepository` - Subscription state, committed with its audit row
//! - `PostgresAuditStore` - Append-only audit trail
//! - `PostgresActionQueue` - The legacy `scheduled_actions` table
//! - `PostgresRenewalLedger` - Charge and renewal-order records

mod action_queue;
mod audit_store;
mod renewal_ledger;
mod subscription_repository;

pub use action_queue::PostgresActionQueue;
pub use audit_store::PostgresAuditStore;
pub use renewal_ledger::PostgresRenewalLedger;
pub use subscription_repository::PostgresSubscriptionRepository;

use std::fmt::Display;

use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{DomainError, ErrorCode};

/// Opens a connection pool and applies pending migrations when configured.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    let pool = config
        .pool_options()
        .connect(&config.url)
        .await
        .map_err(|e| db_error("Failed to connect to database", e))?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| db_error("Failed to run migrations", e))?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

fn db_error(context: &str, e: impl Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

/// A stored value that no longer parses into the domain type.
fn corrupt(column: &str, reason: impl Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid stored value in column '{}': {}", column, reason),
    )
    .with_detail("column", column)
}
