//! PostgreSQL backend - connection pool, migrations and repositories
//!
//! # Design Principles
//!
//! - Connection pool, no shared connection behind a mutex
//! - Rely on DB constraints, no check-then-insert
//! - Foreign keys on `todo_labels` are DEFERRABLE INITIALLY DEFERRED, so
//!   violations surface from COMMIT, never from the INSERT
//! - Log writes use the pool directly and never join a caller's transaction

pub mod migrate;
pub mod pool;
pub mod repos;

use sqlx::{PgPool, Postgres, Transaction};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

pub use pool::create_pool;

/// PostgreSQL-backed store implementing every data-access trait
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with `config`, applying migrations when `run_migrations` is set.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        tracing::debug!(max_connections = config.max_connections, "connecting to database");
        let pool = create_pool(config).await?;

        if config.run_migrations {
            migrate::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are the caller's business.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Commit, logging the rejection if deferred constraints fail.
///
/// PostgreSQL rolls the transaction back itself when COMMIT fails.
pub(crate) async fn commit(tx: Transaction<'_, Postgres>, operation: &'static str) -> Result<()> {
    tx.commit().await.map_err(|e| {
        let err = StoreError::from(e);
        tracing::warn!(operation, error = %err, "commit rejected, transaction rolled back");
        err
    })
}
