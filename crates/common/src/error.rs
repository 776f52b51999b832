//! Error types for Superlists

use thiserror::Error;

/// Result type alias using the Superlists error
pub type Result<T> = std::result::Result<T, Error>;

/// Superlists error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn list_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind: "list".to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
