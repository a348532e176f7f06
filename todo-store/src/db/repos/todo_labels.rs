//! Todo↔label association repository
//!
//! Both foreign keys of `todo_labels` are DEFERRABLE INITIALLY DEFERRED. An
//! INSERT with a dangling id succeeds; the COMMIT that follows fails with
//! SQLSTATE 23503 and PostgreSQL discards the whole transaction.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::{Postgres, Transaction};
use tracing::instrument;

use crate::batch::{Batch, BatchOp, BatchReceipt};
use crate::db::{commit, PgStore};
use crate::error::{Result, StoreError};
use crate::models::{Label, LabelId, Todo, TodoId, TodoLabel};
use crate::store::Associations;

const INSERT_LINK: &str = r#"
    INSERT INTO todo_labels (todo_id, label_id)
    VALUES ($1, $2)
    RETURNING id, todo_id, label_id
"#;

const DELETE_LINKS: &str = "DELETE FROM todo_labels WHERE todo_id = $1 AND label_id = $2";

#[async_trait]
impl Associations for PgStore {
    #[instrument(skip(self), err)]
    async fn link(&self, todo_id: TodoId, label_id: LabelId) -> Result<TodoLabel> {
        let mut tx = self.pool().begin().await?;

        let link = sqlx::query_as::<_, TodoLabel>(INSERT_LINK)
            .bind(todo_id)
            .bind(label_id)
            .fetch_one(&mut *tx)
            .await?;

        commit(tx, "link").await?;
        Ok(link)
    }

    #[instrument(skip(self), err)]
    async fn unlink(&self, todo_id: TodoId, label_id: LabelId) -> Result<u64> {
        let result = sqlx::query(DELETE_LINKS)
            .bind(todo_id)
            .bind(label_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    fn labels_for(&self, todo_id: TodoId) -> BoxStream<'_, Result<Label>> {
        // Collapse duplicate join rows; order by the first one per label.
        sqlx::query_as::<_, Label>(
            r#"
            SELECT l.id, l.name
            FROM labels l
            JOIN (
                SELECT label_id, MIN(id) AS first_link
                FROM todo_labels
                WHERE todo_id = $1
                GROUP BY label_id
            ) tl ON tl.label_id = l.id
            ORDER BY tl.first_link
            "#,
        )
        .bind(todo_id)
        .fetch(self.pool())
        .map_err(StoreError::from)
        .boxed()
    }

    fn todos_for(&self, label_id: LabelId) -> BoxStream<'_, Result<TodoId>> {
        sqlx::query_scalar::<_, TodoId>(
            r#"
            SELECT todo_id
            FROM todo_labels
            WHERE label_id = $1
            GROUP BY todo_id
            ORDER BY MIN(id)
            "#,
        )
        .bind(label_id)
        .fetch(self.pool())
        .map_err(StoreError::from)
        .boxed()
    }

    /// Statements run in batch order inside one transaction. Explicit ids
    /// come from the table sequences via `reserve_*_id`.
    #[instrument(skip(self, batch), fields(ops = batch.len()), err)]
    async fn apply(&self, batch: Batch) -> Result<BatchReceipt> {
        let mut tx = self.pool().begin().await?;
        let mut receipt = BatchReceipt::default();
        let mut max_todo: Option<TodoId> = None;
        let mut max_label: Option<LabelId> = None;

        for op in batch.into_ops() {
            match op {
                BatchOp::CreateTodo { id, text } => {
                    let todo = sqlx::query_as::<_, Todo>(
                        r#"
                        INSERT INTO todos (id, text, completed)
                        VALUES ($1, $2, false)
                        RETURNING id, text, completed
                        "#,
                    )
                    .bind(id)
                    .bind(text.as_str())
                    .fetch_one(&mut *tx)
                    .await?;
                    max_todo = max_todo.max(Some(id));
                    receipt.todos.push(todo);
                }
                BatchOp::CreateLabel { id, name } => {
                    let label = sqlx::query_as::<_, Label>(
                        "INSERT INTO labels (id, name) VALUES ($1, $2) RETURNING id, name",
                    )
                    .bind(id)
                    .bind(name.as_str())
                    .fetch_one(&mut *tx)
                    .await?;
                    max_label = max_label.max(Some(id));
                    receipt.labels.push(label);
                }
                BatchOp::Link { todo_id, label_id } => {
                    let link = sqlx::query_as::<_, TodoLabel>(INSERT_LINK)
                        .bind(todo_id)
                        .bind(label_id)
                        .fetch_one(&mut *tx)
                        .await?;
                    receipt.links.push(link);
                }
                BatchOp::Unlink { todo_id, label_id } => {
                    let result = sqlx::query(DELETE_LINKS)
                        .bind(todo_id)
                        .bind(label_id)
                        .execute(&mut *tx)
                        .await?;
                    receipt.unlinked += result.rows_affected();
                }
            }
        }

        if let Some(id) = max_todo {
            advance_sequence(&mut tx, "todos", id.get()).await?;
        }
        if let Some(id) = max_label {
            advance_sequence(&mut tx, "labels", id.get()).await?;
        }

        commit(tx, "apply").await?;
        tracing::debug!(
            todos = receipt.todos.len(),
            labels = receipt.labels.len(),
            links = receipt.links.len(),
            unlinked = receipt.unlinked,
            "batch committed"
        );
        Ok(receipt)
    }
}

/// Move a serial sequence past an explicitly inserted id so later plain
/// inserts never collide with it. Never moves it backwards.
async fn advance_sequence(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    id: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        SELECT setval(
            pg_get_serial_sequence($1, 'id'),
            GREATEST(
                $2::int8,
                COALESCE(pg_sequence_last_value(pg_get_serial_sequence($1, 'id')::regclass), 0)
            )
        )
        "#,
    )
    .bind(table)
    .bind(i64::from(id))
    .execute(&mut **tx)
    .await?;

    Ok(())
}
