//! Error taxonomy for calls that leave the process.
//!
//! Every failure of the completion service, the embedding backend, or the
//! vector index surfaces as a [`ServiceError`]. Malformed model output is not
//! an error; see [`crate::memory::extract::Extraction::dropped_groups`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Completion call failed (transport, HTTP status, or unreadable body).
    #[error("generation service error: {0}")]
    Generation(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// A vector's length does not match the index dimensionality.
    #[error("vector has {actual} dimensions, index expects {expected}")]
    Dimension { expected: usize, actual: usize },

    /// A blocking worker panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Generation(e.to_string())
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
