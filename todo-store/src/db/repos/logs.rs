//! Request log repository
//!
//! Append-only: INSERT and SELECT, nothing else. Every write goes straight to
//! the pool so a log insert is never part of, and can never abort, a todo or
//! label transaction.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;

use crate::db::PgStore;
use crate::error::Result;
use crate::models::log::clamp_limit;
use crate::models::{LogCursor, LogEntry, LogId, LogPage, NewLog};
use crate::store::RequestLogSink;

/// Rows per multi-VALUES insert; 3 binds each keeps us under the 65535
/// parameter limit.
const INSERT_CHUNK: usize = 5000;

#[async_trait]
impl RequestLogSink for PgStore {
    #[instrument(skip(self, log), fields(user_agent = log.user_agent.as_str()), err)]
    async fn record_entry(&self, log: NewLog) -> Result<LogEntry> {
        let query = match log.timestamp {
            Some(ts) => sqlx::query_as::<_, LogEntry>(
                r#"
                INSERT INTO logs (user_agent, response_time, "timestamp")
                VALUES ($1, $2, $3)
                RETURNING id, user_agent, response_time, "timestamp"
                "#,
            )
            .bind(log.user_agent.as_str())
            .bind(log.response_time.as_millis())
            .bind(ts),
            None => sqlx::query_as::<_, LogEntry>(
                r#"
                INSERT INTO logs (user_agent, response_time)
                VALUES ($1, $2)
                RETURNING id, user_agent, response_time, "timestamp"
                "#,
            )
            .bind(log.user_agent.as_str())
            .bind(log.response_time.as_millis()),
        };

        let entry = query.fetch_one(self.pool()).await?;
        Ok(entry)
    }

    #[instrument(skip(self, logs), fields(count = logs.len()), err)]
    async fn record_many(&self, logs: &[NewLog]) -> Result<Vec<LogId>> {
        let mut ids = Vec::with_capacity(logs.len());

        for chunk in logs.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                r#"INSERT INTO logs (user_agent, response_time, "timestamp") "#,
            );
            builder.push_values(chunk, |mut b, log| {
                b.push_bind(log.user_agent.as_str())
                    .push_bind(log.response_time.as_millis())
                    .push("COALESCE(")
                    .push_bind_unseparated(log.timestamp)
                    .push_unseparated("::timestamp, LOCALTIMESTAMP)");
            });
            builder.push(" RETURNING id");

            let chunk_ids: Vec<LogId> = builder
                .build_query_scalar()
                .fetch_all(self.pool())
                .await?;
            ids.extend(chunk_ids);
        }

        Ok(ids)
    }

    #[instrument(skip(self), err)]
    async fn recent(&self, limit: u32, before: Option<LogCursor>) -> Result<LogPage> {
        let limit = clamp_limit(limit);
        if limit == 0 {
            return Ok(LogPage::empty());
        }

        // One extra row tells us whether another page exists.
        let rows = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT id, user_agent, response_time, "timestamp"
            FROM logs
            WHERE $1::timestamp IS NULL
               OR "timestamp" < $1
               OR ("timestamp" = $1 AND id < $2)
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(before.map(|c| c.timestamp))
        .bind(before.and_then(|c| c.id))
        .bind(i64::from(limit) + 1)
        .fetch_all(self.pool())
        .await?;

        Ok(LogPage::from_overfetch(rows, limit))
    }
}
