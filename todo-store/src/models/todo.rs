//! Todo records and their validated input

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::validation::check_text;
use super::{TodoId, ValidationError};

/// Maximum length for todo text
const MAX_TODO_TEXT_LEN: usize = 100;

/// Todo record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    pub(crate) fn new(id: TodoId, text: TodoText) -> Self {
        Self {
            id,
            text: text.into_string(),
            completed: false,
        }
    }
}

/// Validated todo text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoText(String);

impl TodoText {
    /// Create todo text.
    ///
    /// # Rules
    /// - Not empty or whitespace-only
    /// - Max 100 characters
    ///
    /// # Example
    /// ```
    /// use todo_store::models::TodoText;
    ///
    /// assert!(TodoText::new("buy milk").is_ok());
    /// assert!(TodoText::new("").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        check_text("text", s, MAX_TODO_TEXT_LEN)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for TodoText {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_text("text", &s, MAX_TODO_TEXT_LEN)?;
        Ok(Self(s))
    }
}

impl From<TodoText> for String {
    fn from(t: TodoText) -> Self {
        t.0
    }
}

impl AsRef<str> for TodoText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Payload for creating a todo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTodo {
    pub text: TodoText,
}

impl CreateTodo {
    pub fn new(text: TodoText) -> Self {
        Self { text }
    }
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTodo {
    pub text: Option<TodoText>,
    pub completed: Option<bool>,
}

impl UpdateTodo {
    /// Merge this update over an existing record.
    pub fn apply_to(self, current: &Todo) -> Todo {
        Todo {
            id: current.id,
            text: self
                .text
                .map(TodoText::into_string)
                .unwrap_or_else(|| current.text.clone()),
            completed: self.completed.unwrap_or(current.completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        let err = TodoText::new("").unwrap_err();
        assert!(matches!(err, ValidationError::Empty { .. }));
    }

    #[test]
    fn max_length() {
        assert!(TodoText::new(&"a".repeat(100)).is_ok());

        let err = TodoText::new(&"a".repeat(101)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 100, .. }));
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<CreateTodo, _> = serde_json::from_str(r#"{"text":"write tests"}"#);
        assert!(ok.is_ok());

        let bad: Result<CreateTodo, _> = serde_json::from_str(r#"{"text":""}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn update_keeps_absent_fields() {
        let current = Todo {
            id: TodoId(1),
            text: "before".into(),
            completed: false,
        };

        let updated = UpdateTodo {
            text: None,
            completed: Some(true),
        }
        .apply_to(&current);

        assert_eq!(updated.text, "before");
        assert!(updated.completed);
        assert_eq!(updated.id, current.id);
    }
}
