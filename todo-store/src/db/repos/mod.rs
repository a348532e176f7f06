//! Trait implementations for [`PgStore`](super::PgStore), one file per table
//!
//! Each repository follows these patterns:
//! - RETURNING instead of a second SELECT
//! - Deletes run in an explicit transaction so deferred FK checks at COMMIT
//!   can be reported as `Referential`
//! - Multi-row writes go through a single transaction

pub mod labels;
pub mod logs;
pub mod todo_labels;
pub mod todos;
