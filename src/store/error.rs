//! Backing store error types

use std::time::Duration;

/// Result alias for backing store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error type for backing store operations
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store could not be reached or dropped the connection
    Unavailable(String),
    /// The call did not complete in time
    Timeout(Duration),
    /// The key holds a value of another type
    WrongType(String),
    /// The store answered with an error
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "Store unavailable: {}", reason),
            StoreError::Timeout(after) => {
                write!(f, "Store call timed out after {}ms", after.as_millis())
            }
            StoreError::WrongType(key) => write!(f, "Wrong value type at key: {}", key),
            StoreError::Backend(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.code() == Some("WRONGTYPE") {
            StoreError::WrongType(e.detail().unwrap_or_default().to_string())
        } else if e.is_io_error()
            || e.is_timeout()
            || e.is_connection_dropped()
            || e.is_connection_refusal()
        {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StoreError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Store call timed out after 250ms");

        let err = StoreError::WrongType("track:1".into());
        assert_eq!(err.to_string(), "Wrong value type at key: track:1");
    }
}
