//! Database connection pool management
//!
//! Uses sqlx PgPool with explicit connection limits. Every connection runs in
//! UTC because `logs.timestamp` is a zone-less column filled by `now()`.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use crate::config::StoreConfig;

/// Create a PostgreSQL connection pool from config.
///
/// # Errors
///
/// Returns an error if the connection fails.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&StoreConfig::from_env()?).await?;
/// ```
pub async fn create_pool(config: &StoreConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET TIME ZONE 'UTC'").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
}
