//! Multi-statement batches applied as one transaction
//!
//! Operations run in the order given. Foreign keys are only checked when the
//! batch commits, so a join row may be written before the todo or label it
//! references, as long as both exist by the end of the batch.

use serde::{Deserialize, Serialize};

use crate::models::{Label, LabelId, LabelName, Todo, TodoId, TodoLabel, TodoText};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOp {
    /// Insert a todo under an id obtained from `reserve_todo_id`
    CreateTodo { id: TodoId, text: TodoText },
    /// Insert a label under an id obtained from `reserve_label_id`
    CreateLabel { id: LabelId, name: LabelName },
    Link { todo_id: TodoId, label_id: LabelId },
    Unlink { todo_id: TodoId, label_id: LabelId },
}

/// Ordered list of operations, built fluently.
///
/// # Example
/// ```
/// use todo_store::batch::Batch;
/// use todo_store::models::{LabelId, LabelName, TodoId, TodoText};
///
/// let batch = Batch::new()
///     .link(TodoId(10), LabelId(20))
///     .create_label(LabelId(20), LabelName::new("home").unwrap())
///     .create_todo(TodoId(10), TodoText::new("paint fence").unwrap());
/// assert_eq!(batch.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub fn create_todo(mut self, id: TodoId, text: TodoText) -> Self {
        self.push(BatchOp::CreateTodo { id, text });
        self
    }

    pub fn create_label(mut self, id: LabelId, name: LabelName) -> Self {
        self.push(BatchOp::CreateLabel { id, name });
        self
    }

    pub fn link(mut self, todo_id: TodoId, label_id: LabelId) -> Self {
        self.push(BatchOp::Link { todo_id, label_id });
        self
    }

    pub fn unlink(mut self, todo_id: TodoId, label_id: LabelId) -> Self {
        self.push(BatchOp::Unlink { todo_id, label_id });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl FromIterator<BatchOp> for Batch {
    fn from_iter<I: IntoIterator<Item = BatchOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Rows written by a committed batch, in operation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub todos: Vec<Todo>,
    pub labels: Vec<Label>,
    pub links: Vec<TodoLabel>,
    /// Join rows removed by `Unlink` operations
    pub unlinked: u64,
}
