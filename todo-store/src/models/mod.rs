//! Domain models with validation at construction
//!
//! All caller input is validated when creating these types.
//! Invalid input returns ValidationError before any storage call.

pub mod validation;
pub mod ids;
pub mod todo;
pub mod label;
pub mod log;

pub use validation::ValidationError;
pub use ids::{LabelId, LogId, TodoId, TodoLabelId};
pub use todo::{CreateTodo, Todo, TodoText, UpdateTodo};
pub use label::{Label, LabelName, TodoLabel};
pub use log::{LogCursor, LogEntry, LogPage, NewLog, RequestTimer, ResponseTime, UserAgent};
