//! Todo repository

use async_trait::async_trait;
use tracing::instrument;

use crate::db::{commit, PgStore};
use crate::error::{Result, StoreError};
use crate::models::{CreateTodo, Todo, TodoId, UpdateTodo};
use crate::store::TodoStore;

#[async_trait]
impl TodoStore for PgStore {
    #[instrument(skip(self), err)]
    async fn create_todo(&self, payload: CreateTodo) -> Result<Todo> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (text, completed)
            VALUES ($1, false)
            RETURNING id, text, completed
            "#,
        )
        .bind(payload.text.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(todo)
    }

    #[instrument(skip(self), err)]
    async fn find_todo(&self, id: TodoId) -> Result<Todo> {
        sqlx::query_as::<_, Todo>("SELECT id, text, completed FROM todos WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::not_found("todo", id))
    }

    async fn all_todos(&self) -> Result<Vec<Todo>> {
        let todos =
            sqlx::query_as::<_, Todo>("SELECT id, text, completed FROM todos ORDER BY id DESC")
                .fetch_all(self.pool())
                .await?;

        Ok(todos)
    }

    /// Single statement; absent fields fall back to the stored value.
    #[instrument(skip(self), err)]
    async fn update_todo(&self, id: TodoId, payload: UpdateTodo) -> Result<Todo> {
        sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
            SET text = COALESCE($1, text),
                completed = COALESCE($2, completed)
            WHERE id = $3
            RETURNING id, text, completed
            "#,
        )
        .bind(payload.text.as_ref().map(|t| t.as_str()))
        .bind(payload.completed)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found("todo", id))
    }

    /// No cascade: join rows still pointing here make COMMIT fail.
    #[instrument(skip(self), err)]
    async fn delete_todo(&self, id: TodoId) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from(e).on_delete("todo", id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("todo", id));
        }

        commit(tx, "delete_todo")
            .await
            .map_err(|e| e.on_delete("todo", id))
    }

    async fn reserve_todo_id(&self) -> Result<TodoId> {
        let id: i32 =
            sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('todos', 'id'))::int4")
                .fetch_one(self.pool())
                .await?;

        Ok(TodoId(id))
    }
}
