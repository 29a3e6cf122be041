//! Error types for the qingest CLI
//!
//! Messages are user-facing: each one names what failed and, where there is
//! one, the single unit (chunk, transaction, file) to retry by hand.

use crate::transaction::TransactionState;
use qingest_common::IngestError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit status for a batch that finished with some failed chunks
pub const EXIT_PARTIAL_FAILURE: i32 = 3;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration, remote-service, credential and graph errors
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// HTTP request failed before a response arrived
    #[error("Network request failed: {0}. Check the ingest service URL and that the service is reachable.")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}. Check the file syntax.")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse configuration: {0}. Check the TOML syntax.")]
    TomlParse(#[from] toml::de::Error),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// A transition the transaction's current state does not allow
    #[error("Cannot {attempted} transaction {id}: it is already {state}")]
    TransactionState {
        id: u64,
        state: TransactionState,
        attempted: &'static str,
    },

    /// A per-chunk or terminal request with no open transaction to reference
    #[error("No open transaction: {0}")]
    TransactionNotOpen(String),

    /// The batch ran to completion but some chunks failed
    #[error("{failed} of {total} chunk operations failed. Retry the chunks logged above individually.")]
    PartialFailure { failed: usize, total: usize },
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Ingest(IngestError::configuration(msg))
    }

    /// Create a remote-service error for the named operation
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingest(IngestError::remote(operation, message))
    }

    pub fn not_open(msg: impl Into<String>) -> Self {
        Self::TransactionNotOpen(msg.into())
    }

    /// Server-reported error text, if this is a remote-service failure
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Ingest(IngestError::RemoteService { message, .. }) => Some(message),
            _ => None,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PartialFailure { .. } => EXIT_PARTIAL_FAILURE,
            _ => 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::PartialFailure { failed: 1, total: 4 }.exit_code(), 3);
        assert_eq!(CliError::config("no input list").exit_code(), 1);
        assert_eq!(CliError::not_open("closed").exit_code(), 1);
    }

    #[test]
    fn test_state_violation_message() {
        let err = CliError::TransactionState {
            id: 17,
            state: TransactionState::Aborted,
            attempted: "commit",
        };
        assert_eq!(err.to_string(), "Cannot commit transaction 17: it is already aborted");
    }

    #[test]
    fn test_remote_message() {
        let err = CliError::remote("create-database", "database already exists");
        assert_eq!(err.remote_message(), Some("database already exists"));
        assert!(CliError::config("x").remote_message().is_none());
    }
}
