use thiserror::Error;

use crate::validation::ValidationError;

pub type NoteResult<T> = Result<T, NoteError>;

/// Error value returned by a remote store or auth backend.
///
/// `message` is the human-readable text from the backend and is shown to the
/// user as-is.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    AccountExists(String),

    #[error("User not found. Please sign in.")]
    NotAuthenticated,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Thread safety violation: process_events() must be called on the registration thread")]
    ThreadSafetyViolation,

    #[error("No callbacks registered yet")]
    NoCallbacksRegistered,

    #[error("{0} is already in progress")]
    InProgress(String),
}

impl NoteError {
    /// True when the failure was caught before any backend was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(self, NoteError::Validation(_))
    }
}

impl From<serde_json::Error> for NoteError {
    fn from(err: serde_json::Error) -> Self {
        NoteError::Serialization(err.to_string())
    }
}

impl From<uuid::Error> for NoteError {
    fn from(err: uuid::Error) -> Self {
        NoteError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_message_is_verbatim() {
        let err: NoteError = StoreError::new("duplicate key value violates unique constraint")
            .with_status(409)
            .with_code("23505")
            .into();
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_errors_render_user_messages() {
        let err: NoteError = ValidationError::TitleRequired.into();
        assert_eq!(err.to_string(), "Title is required");
        assert!(err.is_validation());
        assert_eq!(
            NoteError::NotAuthenticated.to_string(),
            "User not found. Please sign in."
        );
    }
}
