//! Error types for todo-store
//!
//! `sqlx` errors are classified by SQLSTATE so callers can tell an integrity
//! violation at commit apart from a retryable serialization conflict. The
//! original error text is preserved in every variant.

use thiserror::Error;

use crate::models::ValidationError;

/// PostgreSQL SQLSTATE codes the store reacts to
mod sqlstate {
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
}

pub use sqlstate::FOREIGN_KEY_VIOLATION;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Input rejected before reaching storage
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Constraint violated, surfaced at commit; the transaction rolled back
    #[error("integrity error: {reason}")]
    Integrity {
        reason: String,
        sqlstate: Option<String>,
    },

    /// Delete of a row that join rows still point at
    #[error("referential error: {resource} '{id}' is still referenced")]
    Referential { resource: &'static str, id: String },

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// Serialization failure or deadlock; safe to retry the whole operation
    #[error("transaction conflict: {0}")]
    Conflict(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl StoreError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn integrity(reason: impl Into<String>) -> Self {
        Self::Integrity {
            reason: reason.into(),
            sqlstate: None,
        }
    }

    /// Dangling foreign key detected at commit.
    pub fn dangling(reason: impl Into<String>) -> Self {
        Self::Integrity {
            reason: reason.into(),
            sqlstate: Some(FOREIGN_KEY_VIOLATION.to_owned()),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Re-tag a foreign key violation raised while deleting `resource`.
    ///
    /// The same SQLSTATE means "dangling reference" on insert and "still
    /// referenced" on delete; only the caller knows which.
    pub(crate) fn on_delete(self, resource: &'static str, id: impl ToString) -> Self {
        match self {
            Self::Integrity {
                sqlstate: Some(ref code),
                ..
            } if code == FOREIGN_KEY_VIOLATION => Self::Referential {
                resource,
                id: id.to_string(),
            },
            other => other,
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());

        match code.as_deref() {
            Some(
                sqlstate::NOT_NULL_VIOLATION
                | sqlstate::FOREIGN_KEY_VIOLATION
                | sqlstate::UNIQUE_VIOLATION
                | sqlstate::CHECK_VIOLATION,
            ) => {
                let reason = err
                    .as_database_error()
                    .map(|db| db.message().to_owned())
                    .unwrap_or_else(|| err.to_string());
                Self::Integrity {
                    reason,
                    sqlstate: code,
                }
            }
            Some(sqlstate::SERIALIZATION_FAILURE | sqlstate::DEADLOCK_DETECTED) => {
                Self::Conflict(err)
            }
            _ => Self::Database(err),
        }
    }
}
