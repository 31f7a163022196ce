//! Error types for DIDHub sync operations

use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync error types
///
/// Payloads are plain strings so a single failure can be cloned out to
/// every caller waiting on a coalesced request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Record not found in the remote store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure (connection refused, timeout, bad status)
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A relationship store call failed
    #[error("Relationship store {operation} failed: {message}")]
    Store { operation: String, message: String },

    /// A cached producer failed or panicked
    #[error("Producer failed: {0}")]
    Producer(String),

    /// Input could not be used for the requested operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Build a store error for the named operation
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether a retry of the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Store { .. } | SyncError::Producer(_)
        )
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = SyncError::store("delete_edge", "HTTP 500 - boom");
        assert_eq!(
            err.to_string(),
            "Relationship store delete_edge failed: HTTP 500 - boom"
        );
        assert!(err.is_transient());
        assert!(!SyncError::InvalidInput("x".into()).is_transient());
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: SyncError = parse.unwrap_err().into();
        assert!(matches!(err, SyncError::Serialization(_)));
    }
}
