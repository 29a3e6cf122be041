//! Error types shared across the qingest workspace

use thiserror::Error;

/// Result type alias for qingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Error taxonomy for workflow compilation and ingest-service calls.
///
/// `Configuration` errors are fatal and never retried. `RemoteService` errors
/// carry the operation name so callers can decide whether the failure is
/// fatal (lifecycle calls) or isolated to one chunk.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{operation} failed: {message}")]
    RemoteService { operation: String, message: String },

    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Invalid workflow graph: {0}")]
    InvalidGraph(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IngestError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a remote service error for the named operation
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid graph error
    pub fn invalid_graph(msg: impl Into<String>) -> Self {
        Self::InvalidGraph(msg.into())
    }

    /// Whether the error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RemoteService { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = IngestError::remote("allocate-chunk", "no capacity");
        assert_eq!(err.to_string(), "allocate-chunk failed: no capacity");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_configuration_is_fatal() {
        assert!(IngestError::configuration("missing input list").is_fatal());
        assert!(IngestError::invalid_graph("cycle").is_fatal());
    }
}
