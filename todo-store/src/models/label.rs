//! Labels and the todo↔label join row

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::validation::check_text;
use super::{LabelId, TodoId, TodoLabelId, ValidationError};

/// Maximum length for label names
const MAX_LABEL_NAME_LEN: usize = 100;

/// Label record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
}

/// Validated label name.
///
/// Names are not unique: two labels may share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelName(String);

impl LabelName {
    /// Create a label name.
    ///
    /// # Example
    /// ```
    /// use todo_store::models::LabelName;
    ///
    /// assert!(LabelName::new("urgent").is_ok());
    /// assert!(LabelName::new("  ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        check_text("label name", s, MAX_LABEL_NAME_LEN)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for LabelName {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_text("label name", &s, MAX_LABEL_NAME_LEN)?;
        Ok(Self(s))
    }
}

impl From<LabelName> for String {
    fn from(n: LabelName) -> Self {
        n.0
    }
}

impl AsRef<str> for LabelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Join row between a todo and a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TodoLabel {
    pub id: TodoLabelId,
    pub todo_id: TodoId,
    pub label_id: LabelId,
}
