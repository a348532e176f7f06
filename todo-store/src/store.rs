//! Data-access traits consumed by the handler layer
//!
//! Each component of the core is one trait. Method names are distinct across
//! traits so a single backend type can implement all of them without
//! ambiguous calls.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::batch::{Batch, BatchReceipt};
use crate::error::Result;
use crate::models::{
    CreateTodo, Label, LabelId, LabelName, LogCursor, LogEntry, LogId, LogPage, NewLog, Todo,
    TodoId, TodoLabel, UpdateTodo,
};

/// Task records
#[async_trait]
pub trait TodoStore: Clone + Send + Sync + 'static {
    async fn create_todo(&self, payload: CreateTodo) -> Result<Todo>;

    async fn find_todo(&self, id: TodoId) -> Result<Todo>;

    /// Newest first.
    async fn all_todos(&self) -> Result<Vec<Todo>>;

    async fn update_todo(&self, id: TodoId, payload: UpdateTodo) -> Result<Todo>;

    /// Fails with `Referential` while labels are still attached.
    async fn delete_todo(&self, id: TodoId) -> Result<()>;

    /// Draw the next id without inserting a row.
    async fn reserve_todo_id(&self) -> Result<TodoId>;
}

/// Label definitions
#[async_trait]
pub trait LabelStore: Clone + Send + Sync + 'static {
    /// Inserts unconditionally; duplicate names are allowed.
    async fn create_label(&self, name: LabelName) -> Result<Label>;

    async fn get_label(&self, id: LabelId) -> Result<Label>;

    async fn all_labels(&self) -> Result<Vec<Label>>;

    /// Fails with `Referential` at commit while join rows point at the label.
    async fn delete_label(&self, id: LabelId) -> Result<()>;

    async fn reserve_label_id(&self) -> Result<LabelId>;
}

/// The todo↔label join table
#[async_trait]
pub trait Associations: Clone + Send + Sync + 'static {
    /// Insert one join row in its own transaction; both references are
    /// checked at commit.
    async fn link(&self, todo_id: TodoId, label_id: LabelId) -> Result<TodoLabel>;

    /// Remove every join row for the pair. Returns how many were removed;
    /// zero is not an error.
    async fn unlink(&self, todo_id: TodoId, label_id: LabelId) -> Result<u64>;

    /// Labels attached to a todo, each once, ordered by when it was first
    /// attached. Nothing is read until the stream is polled; calling again
    /// starts a fresh read.
    fn labels_for(&self, todo_id: TodoId) -> BoxStream<'_, Result<Label>>;

    /// Todos carrying a label, each once, in attachment order.
    fn todos_for(&self, label_id: LabelId) -> BoxStream<'_, Result<TodoId>>;

    /// Run a batch atomically. Integrity is validated at commit; on failure
    /// nothing from the batch is visible.
    async fn apply(&self, batch: Batch) -> Result<BatchReceipt>;
}

/// Append-only request telemetry
#[async_trait]
pub trait RequestLogSink: Clone + Send + Sync + 'static {
    /// Validate and append one entry stamped at write time.
    async fn record(&self, user_agent: &str, response_time_ms: i64) -> Result<LogEntry> {
        let log = NewLog::new(user_agent, response_time_ms)?;
        self.record_entry(log).await
    }

    async fn record_entry(&self, log: NewLog) -> Result<LogEntry>;

    async fn record_many(&self, logs: &[NewLog]) -> Result<Vec<LogId>>;

    /// Newest first, strictly older than `before` when given.
    ///
    /// `limit` is capped at 1000. A zero limit reads nothing and returns an
    /// empty page with no cursor.
    async fn recent(&self, limit: u32, before: Option<LogCursor>) -> Result<LogPage>;
}
