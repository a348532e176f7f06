//! Surrogate identifiers
//!
//! Each table gets its own newtype so a label id can never be passed where a
//! todo id is expected. All of them are `#[sqlx(transparent)]` and map to the
//! underlying `serial` / `bigserial` column.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Raw database value.
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

surrogate_id!(
    /// `todos.id`
    TodoId,
    i32
);
surrogate_id!(
    /// `labels.id`
    LabelId,
    i32
);
surrogate_id!(
    /// `todo_labels.id`
    TodoLabelId,
    i32
);
surrogate_id!(
    /// `logs.id`
    LogId,
    i64
);
