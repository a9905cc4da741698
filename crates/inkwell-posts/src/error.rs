//! Error types for the post store.

/// Errors that can occur during post and category operations.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// A required field was missing, empty, or too long.
    #[error("{0}")]
    Validation(String),

    /// No post exists with the given id.
    #[error("post not found: {0}")]
    NotFound(i64),

    /// A database operation failed.
    #[error("post database error: {0}")]
    Database(#[from] rusqlite::Error),
}
