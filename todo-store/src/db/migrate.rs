//! Schema migrations
//!
//! Scripts live in `todo-store/migrations/` as `<timestamp>_<name>.sql` and
//! are embedded at compile time. They are forward-only; the sqlx ledger
//! (`_sqlx_migrations`) guarantees each one runs exactly once.

use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::{FromRow, PgPool};

use crate::error::Result;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// One row of the migration ledger
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
    pub installed_on: DateTime<Utc>,
    pub success: bool,
}

/// Apply all pending migrations.
pub async fn run(pool: &PgPool) -> Result<()> {
    tracing::info!(available = MIGRATOR.iter().count(), "Running migrations...");
    MIGRATOR.run(pool).await?;
    tracing::info!("Migrations complete");
    Ok(())
}

/// Read the ledger, oldest first.
pub async fn applied(pool: &PgPool) -> Result<Vec<AppliedMigration>> {
    let rows = sqlx::query_as::<_, AppliedMigration>(
        r#"
        SELECT version, description, installed_on, success
        FROM _sqlx_migrations
        ORDER BY version
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Versions embedded in this build, in application order.
pub fn versions() -> Vec<i64> {
    MIGRATOR.iter().map(|m| m.version).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing_timestamps() {
        let versions = versions();
        assert_eq!(versions.len(), 3);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        // YYYYMMDDHHMMSS
        assert!(versions.iter().all(|v| v.to_string().len() == 14));
    }

    #[test]
    fn join_table_references_are_deferred() {
        let labels = MIGRATOR
            .iter()
            .find(|m| m.description == "labels")
            .expect("labels migration embedded");

        let sql = labels.sql.to_uppercase();
        assert_eq!(sql.matches("DEFERRABLE INITIALLY DEFERRED").count(), 2);
        assert!(!sql.contains("UNIQUE"));
        assert!(!sql.contains("CASCADE"));
    }

    #[test]
    fn logs_timestamp_defaults_to_now() {
        let logs = MIGRATOR
            .iter()
            .find(|m| m.description == "logs")
            .expect("logs migration embedded");

        assert!(logs.sql.contains("timestamp TIMESTAMP NOT NULL DEFAULT now()"));
        assert!(logs.sql.contains("BIGSERIAL"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn run_is_idempotent() {
        let config = crate::config::StoreConfig::from_env().expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&config).await.expect("pool");

        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");

        let ledger = applied(&pool).await.expect("ledger");
        let ledger_versions: Vec<i64> = ledger.iter().map(|m| m.version).collect();
        assert_eq!(ledger_versions, versions());
        assert!(ledger.iter().all(|m| m.success));
    }
}
