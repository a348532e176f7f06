//! Pending buffer for the in-memory two-phase commit
//!
//! `MemoryStore` has no constraint engine, so foreign keys are enforced in
//! three steps while the table lock is held:
//!
//! 1. **stage** every operation into a [`Pending`] overlay without checking
//!    references
//! 2. **validate** that every surviving join row points at a todo and a label
//!    that exist in the committed tables or in the overlay
//! 3. **apply** the overlay to the tables
//!
//! Nothing is written to the tables before step 3, so a failed validation
//! leaves no trace.

use std::collections::{BTreeMap, BTreeSet};

use crate::batch::{BatchOp, BatchReceipt};
use crate::error::{Result, StoreError};
use crate::models::{Label, LabelId, Todo, TodoId, TodoLabel, TodoLabelId};

use super::{Sequences, Tables};

pub(super) struct Pending<'t> {
    base: &'t Tables,
    todos: BTreeMap<TodoId, Todo>,
    labels: BTreeMap<LabelId, Label>,
    links: Vec<TodoLabel>,
    removed_links: BTreeSet<TodoLabelId>,
    deleted_todos: BTreeSet<TodoId>,
    deleted_labels: BTreeSet<LabelId>,
    receipt: BatchReceipt,
}

/// Validated overlay, ready to apply
pub(super) struct Staged {
    todos: BTreeMap<TodoId, Todo>,
    labels: BTreeMap<LabelId, Label>,
    links: Vec<TodoLabel>,
    removed_links: BTreeSet<TodoLabelId>,
    deleted_todos: BTreeSet<TodoId>,
    deleted_labels: BTreeSet<LabelId>,
    receipt: BatchReceipt,
}

impl<'t> Pending<'t> {
    pub(super) fn new(base: &'t Tables) -> Self {
        Self {
            base,
            todos: BTreeMap::new(),
            labels: BTreeMap::new(),
            links: Vec::new(),
            removed_links: BTreeSet::new(),
            deleted_todos: BTreeSet::new(),
            deleted_labels: BTreeSet::new(),
            receipt: BatchReceipt::default(),
        }
    }

    fn todo_exists(&self, id: TodoId) -> bool {
        !self.deleted_todos.contains(&id)
            && (self.base.todos.contains_key(&id) || self.todos.contains_key(&id))
    }

    fn label_exists(&self, id: LabelId) -> bool {
        !self.deleted_labels.contains(&id)
            && (self.base.labels.contains_key(&id) || self.labels.contains_key(&id))
    }

    /// Phase 1. Only primary key clashes fail here, like a unique index
    /// would at statement time.
    pub(super) fn stage(&mut self, op: BatchOp, seq: &Sequences) -> Result<()> {
        match op {
            BatchOp::CreateTodo { id, text } => {
                if self.todo_exists(id) {
                    return Err(StoreError::integrity(format!(
                        "duplicate key: todos.id = {}",
                        id
                    )));
                }
                seq.observe_todo(id);
                let todo = Todo::new(id, text);
                self.receipt.todos.push(todo.clone());
                self.todos.insert(id, todo);
            }
            BatchOp::CreateLabel { id, name } => {
                if self.label_exists(id) {
                    return Err(StoreError::integrity(format!(
                        "duplicate key: labels.id = {}",
                        id
                    )));
                }
                seq.observe_label(id);
                let label = Label {
                    id,
                    name: name.into_string(),
                };
                self.receipt.labels.push(label.clone());
                self.labels.insert(id, label);
            }
            BatchOp::Link { todo_id, label_id } => {
                let link = TodoLabel {
                    id: seq.next_todo_label(),
                    todo_id,
                    label_id,
                };
                self.receipt.links.push(link);
                self.links.push(link);
            }
            BatchOp::Unlink { todo_id, label_id } => {
                let matches = |l: &TodoLabel| l.todo_id == todo_id && l.label_id == label_id;

                let before = self.links.len();
                self.links.retain(|l| !matches(l));
                let mut removed = (before - self.links.len()) as u64;

                for link in self.base.todo_labels.iter().filter(|l| matches(l)) {
                    if self.removed_links.insert(link.id) {
                        removed += 1;
                    }
                }
                self.receipt.unlinked += removed;
            }
        }
        Ok(())
    }

    pub(super) fn delete_todo(&mut self, id: TodoId) -> Result<()> {
        if !self.todo_exists(id) {
            return Err(StoreError::not_found("todo", id));
        }
        self.todos.remove(&id);
        self.deleted_todos.insert(id);
        Ok(())
    }

    pub(super) fn delete_label(&mut self, id: LabelId) -> Result<()> {
        if !self.label_exists(id) {
            return Err(StoreError::not_found("label", id));
        }
        self.labels.remove(&id);
        self.deleted_labels.insert(id);
        Ok(())
    }

    /// Phase 2. Every join row that would exist after the batch must
    /// resolve both of its references.
    pub(super) fn validate(self) -> Result<Staged> {
        let surviving = self
            .base
            .todo_labels
            .iter()
            .filter(|l| !self.removed_links.contains(&l.id))
            .chain(self.links.iter());

        for link in surviving {
            if !self.todo_exists(link.todo_id) {
                return Err(StoreError::dangling(format!(
                    "todo_labels.todo_id = {} is not present in todos",
                    link.todo_id
                )));
            }
            if !self.label_exists(link.label_id) {
                return Err(StoreError::dangling(format!(
                    "todo_labels.label_id = {} is not present in labels",
                    link.label_id
                )));
            }
        }

        Ok(Staged {
            todos: self.todos,
            labels: self.labels,
            links: self.links,
            removed_links: self.removed_links,
            deleted_todos: self.deleted_todos,
            deleted_labels: self.deleted_labels,
            receipt: self.receipt,
        })
    }
}

impl Staged {
    /// Phase 3. Infallible.
    pub(super) fn apply(self, tables: &mut Tables) -> BatchReceipt {
        for id in &self.deleted_todos {
            tables.todos.remove(id);
        }
        for id in &self.deleted_labels {
            tables.labels.remove(id);
        }
        tables.todos.extend(self.todos);
        tables.labels.extend(self.labels);

        if !self.removed_links.is_empty() {
            tables
                .todo_labels
                .retain(|l| !self.removed_links.contains(&l.id));
        }
        tables.todo_labels.extend(self.links);

        self.receipt
    }
}
