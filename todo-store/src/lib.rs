//! todo-store: relational core for todos, labels and request logs
//!
//! Two backends implement the same data-access traits:
//!
//! - [`PgStore`] on PostgreSQL, with the todo↔label foreign keys declared
//!   DEFERRABLE INITIALLY DEFERRED so integrity is checked at COMMIT
//! - [`MemoryStore`] in process, enforcing the same rules with a staged
//!   commit
//!
//! The request log is append-only and lives beside the relational core; a
//! log write never participates in a todo or label transaction.

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod models;
pub mod store;

pub use batch::{Batch, BatchOp, BatchReceipt};
pub use config::StoreConfig;
pub use db::PgStore;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::{Associations, LabelStore, RequestLogSink, TodoStore};
