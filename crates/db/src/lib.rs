// crates/db/src/lib.rs
//! Postgres persistence for gitscout.
//!
//! [`Database`] wraps a `PgPool` and implements every store trait from
//! `gitscout_core::store`. Schema setup runs as inline idempotent
//! migrations at connect time. [`memory::InMemoryStore`] provides the same
//! traits over process memory for tests.

pub mod memory;
mod migrations;
mod queries;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Main database handle wrapping a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database at `url` and run migrations.
    pub async fn connect(url: &str) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Wrap an existing pool without running migrations (tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn migrate(&self) -> DbResult<()> {
        for statement in migrations::MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(statements = migrations::MIGRATIONS.len(), "database migrations applied");
        Ok(())
    }
}
