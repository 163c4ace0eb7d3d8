use crate::store::StoreError;
use thiserror::Error;

/// Job queue errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    #[error("Queue store error: {0}")]
    Store(#[from] StoreError),

    /// A job envelope could not be encoded or decoded
    #[error("Job {id} envelope is unreadable: {message}")]
    Envelope { id: String, message: String },
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Store(err) => err.is_transient(),
            QueueError::Envelope { .. } => false,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
