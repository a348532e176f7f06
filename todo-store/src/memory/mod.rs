//! In-memory backend
//!
//! Same contract as [`PgStore`](crate::db::PgStore) without a database.
//! Deferred foreign keys are emulated by the stage → validate → apply
//! protocol in [`pending`]. Todo, label and join tables share one lock, which
//! a write operation holds from staging through apply; the request log has its
//! own lock and never waits on the tables.

mod pending;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tokio::sync::RwLock;

use crate::batch::{Batch, BatchOp, BatchReceipt};
use crate::error::{Result, StoreError};
use crate::models::log::clamp_limit;
use crate::models::{
    CreateTodo, Label, LabelId, LabelName, LogCursor, LogEntry, LogId, LogPage, NewLog, Todo,
    TodoId, TodoLabel, TodoLabelId, UpdateTodo,
};
use crate::store::{Associations, LabelStore, RequestLogSink, TodoStore};

use pending::Pending;

#[derive(Debug, Default)]
struct Tables {
    todos: BTreeMap<TodoId, Todo>,
    labels: BTreeMap<LabelId, Label>,
    /// Insertion order
    todo_labels: Vec<TodoLabel>,
}

/// Identity generators, one per table. Values are never reused, even when the
/// transaction that drew them is rolled back.
#[derive(Debug, Default)]
struct Sequences {
    todos: AtomicI32,
    labels: AtomicI32,
    todo_labels: AtomicI32,
    logs: AtomicI64,
}

impl Sequences {
    fn next_todo(&self) -> TodoId {
        TodoId(self.todos.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_label(&self) -> LabelId {
        LabelId(self.labels.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_todo_label(&self) -> TodoLabelId {
        TodoLabelId(self.todo_labels.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_log(&self) -> LogId {
        LogId(self.logs.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Keep generated ids ahead of an explicitly written one.
    fn observe_todo(&self, id: TodoId) {
        self.todos.fetch_max(id.get(), Ordering::SeqCst);
    }

    fn observe_label(&self, id: LabelId) {
        self.labels.fetch_max(id.get(), Ordering::SeqCst);
    }
}

/// Thread-safe in-memory store; clones share state
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    log: Arc<RwLock<Vec<LogEntry>>>,
    seq: Arc<Sequences>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one write transaction under the table lock.
    async fn transact<F>(&self, operation: &'static str, stage: F) -> Result<BatchReceipt>
    where
        F: FnOnce(&mut Pending<'_>) -> Result<()>,
    {
        let mut tables = self.tables.write().await;

        let mut pending = Pending::new(&tables);
        stage(&mut pending)?;
        let staged = pending.validate().map_err(|err| {
            tracing::warn!(operation, error = %err, "commit rejected, transaction rolled back");
            err
        })?;

        Ok(staged.apply(&mut tables))
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn create_todo(&self, payload: CreateTodo) -> Result<Todo> {
        let mut tables = self.tables.write().await;
        let todo = Todo::new(self.seq.next_todo(), payload.text);
        tables.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn find_todo(&self, id: TodoId) -> Result<Todo> {
        let tables = self.tables.read().await;
        tables
            .todos
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("todo", id))
    }

    async fn all_todos(&self) -> Result<Vec<Todo>> {
        let tables = self.tables.read().await;
        Ok(tables.todos.values().rev().cloned().collect())
    }

    async fn update_todo(&self, id: TodoId, payload: UpdateTodo) -> Result<Todo> {
        let mut tables = self.tables.write().await;
        let current = tables
            .todos
            .get(&id)
            .ok_or_else(|| StoreError::not_found("todo", id))?;
        let todo = payload.apply_to(current);
        tables.todos.insert(id, todo.clone());
        Ok(todo)
    }

    async fn delete_todo(&self, id: TodoId) -> Result<()> {
        self.transact("delete_todo", |p| p.delete_todo(id))
            .await
            .map(|_| ())
            .map_err(|e| e.on_delete("todo", id))
    }

    async fn reserve_todo_id(&self) -> Result<TodoId> {
        Ok(self.seq.next_todo())
    }
}

#[async_trait]
impl LabelStore for MemoryStore {
    async fn create_label(&self, name: LabelName) -> Result<Label> {
        let mut tables = self.tables.write().await;
        let label = Label {
            id: self.seq.next_label(),
            name: name.into_string(),
        };
        tables.labels.insert(label.id, label.clone());
        Ok(label)
    }

    async fn get_label(&self, id: LabelId) -> Result<Label> {
        let tables = self.tables.read().await;
        tables
            .labels
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("label", id))
    }

    async fn all_labels(&self) -> Result<Vec<Label>> {
        let tables = self.tables.read().await;
        Ok(tables.labels.values().cloned().collect())
    }

    async fn delete_label(&self, id: LabelId) -> Result<()> {
        self.transact("delete_label", |p| p.delete_label(id))
            .await
            .map(|_| ())
            .map_err(|e| e.on_delete("label", id))
    }

    async fn reserve_label_id(&self) -> Result<LabelId> {
        Ok(self.seq.next_label())
    }
}

#[async_trait]
impl Associations for MemoryStore {
    async fn link(&self, todo_id: TodoId, label_id: LabelId) -> Result<TodoLabel> {
        let receipt = self
            .transact("link", |p| {
                p.stage(BatchOp::Link { todo_id, label_id }, &self.seq)
            })
            .await?;

        receipt
            .links
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::integrity("link staged no row"))
    }

    async fn unlink(&self, todo_id: TodoId, label_id: LabelId) -> Result<u64> {
        let receipt = self
            .transact("unlink", |p| {
                p.stage(BatchOp::Unlink { todo_id, label_id }, &self.seq)
            })
            .await?;

        Ok(receipt.unlinked)
    }

    fn labels_for(&self, todo_id: TodoId) -> BoxStream<'_, Result<Label>> {
        stream::once(async move {
            let tables = self.tables.read().await;
            let mut seen = BTreeSet::new();
            let labels: Vec<Label> = tables
                .todo_labels
                .iter()
                .filter(|l| l.todo_id == todo_id && seen.insert(l.label_id))
                .filter_map(|l| tables.labels.get(&l.label_id).cloned())
                .collect();
            Ok::<_, StoreError>(stream::iter(labels.into_iter().map(Ok::<Label, StoreError>)))
        })
        .try_flatten()
        .boxed()
    }

    fn todos_for(&self, label_id: LabelId) -> BoxStream<'_, Result<TodoId>> {
        stream::once(async move {
            let tables = self.tables.read().await;
            let mut seen = BTreeSet::new();
            let todos: Vec<TodoId> = tables
                .todo_labels
                .iter()
                .filter(|l| l.label_id == label_id && seen.insert(l.todo_id))
                .map(|l| l.todo_id)
                .collect();
            Ok::<_, StoreError>(stream::iter(todos.into_iter().map(Ok::<TodoId, StoreError>)))
        })
        .try_flatten()
        .boxed()
    }

    async fn apply(&self, batch: Batch) -> Result<BatchReceipt> {
        let ops = batch.len();
        let receipt = self
            .transact("apply", |p| {
                batch
                    .into_ops()
                    .into_iter()
                    .try_for_each(|op| p.stage(op, &self.seq))
            })
            .await?;

        tracing::debug!(ops, links = receipt.links.len(), "batch committed");
        Ok(receipt)
    }
}

#[async_trait]
impl RequestLogSink for MemoryStore {
    async fn record_entry(&self, log: NewLog) -> Result<LogEntry> {
        let mut entries = self.log.write().await;
        let entry = LogEntry {
            id: self.seq.next_log(),
            user_agent: log.user_agent.into(),
            response_time: log.response_time.as_millis(),
            timestamp: log.timestamp.unwrap_or_else(|| Utc::now().naive_utc()),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn record_many(&self, logs: &[NewLog]) -> Result<Vec<LogId>> {
        let mut entries = self.log.write().await;
        let now = Utc::now().naive_utc();

        let ids = logs
            .iter()
            .map(|log| {
                let entry = LogEntry {
                    id: self.seq.next_log(),
                    user_agent: log.user_agent.as_str().to_owned(),
                    response_time: log.response_time.as_millis(),
                    timestamp: log.timestamp.unwrap_or(now),
                };
                let id = entry.id;
                entries.push(entry);
                id
            })
            .collect();

        Ok(ids)
    }

    async fn recent(&self, limit: u32, before: Option<LogCursor>) -> Result<LogPage> {
        let limit = clamp_limit(limit);
        if limit == 0 {
            return Ok(LogPage::empty());
        }
        let entries = self.log.read().await;

        let mut rows: Vec<LogEntry> = entries
            .iter()
            .filter(|e| before.map_or(true, |c| c.admits(e)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        rows.truncate(limit as usize + 1);

        Ok(LogPage::from_overfetch(rows, limit))
    }
}
