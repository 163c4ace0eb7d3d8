use thiserror::Error;

/// Coordination store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Connection or command failure reported by the backend
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A key holds a value of a different type than the operation expects
    #[error("Wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// A stored value could not be decoded
    #[error("Corrupt value at {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl StoreError {
    /// Backend failures are worth another attempt; type/encoding errors are not
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
