//! Label repository
//!
//! - create: plain INSERT, no duplicate-name check
//! - delete: the FK check on `todo_labels` is deferred, so a still-referenced
//!   label is only rejected when the delete commits

use async_trait::async_trait;
use tracing::instrument;

use crate::db::{commit, PgStore};
use crate::error::{Result, StoreError};
use crate::models::{Label, LabelId, LabelName};
use crate::store::LabelStore;

#[async_trait]
impl LabelStore for PgStore {
    #[instrument(skip(self), err)]
    async fn create_label(&self, name: LabelName) -> Result<Label> {
        let label = sqlx::query_as::<_, Label>(
            "INSERT INTO labels (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(label)
    }

    #[instrument(skip(self), err)]
    async fn get_label(&self, id: LabelId) -> Result<Label> {
        sqlx::query_as::<_, Label>("SELECT id, name FROM labels WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::not_found("label", id))
    }

    async fn all_labels(&self) -> Result<Vec<Label>> {
        let labels = sqlx::query_as::<_, Label>("SELECT id, name FROM labels ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        Ok(labels)
    }

    #[instrument(skip(self), err)]
    async fn delete_label(&self, id: LabelId) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from(e).on_delete("label", id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("label", id));
        }

        commit(tx, "delete_label")
            .await
            .map_err(|e| e.on_delete("label", id))
    }

    async fn reserve_label_id(&self) -> Result<LabelId> {
        let id: i32 =
            sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('labels', 'id'))::int4")
                .fetch_one(self.pool())
                .await?;

        Ok(LabelId(id))
    }
}
