//! Super-transaction lifecycle

pub mod coordinator;
pub mod log;

pub use coordinator::{ChunkPermit, TransactionCoordinator, TransactionState};
pub use log::{parse_transaction_id, read_transaction_id, started_line};

use crate::api::{StartTransactionResponse, TransactionId};
use crate::error::{CliError, Result};
use std::path::PathBuf;

/// Where a command gets the id of the transaction it works in
#[derive(Debug, Clone)]
pub enum TransactionIdSource {
    /// Given on the command line
    Explicit(TransactionId),
    /// Scraped from a `start-transaction` log
    LogFile(PathBuf),
    /// Taken from a start-transaction response
    StartResponse {
        database: String,
        response: StartTransactionResponse,
    },
}

impl TransactionIdSource {
    /// Build from the `--id` / `--id-file` pair; exactly one must be given
    pub fn from_args(id: Option<TransactionId>, id_file: Option<PathBuf>) -> Result<Self> {
        match (id, id_file) {
            (Some(id), None) => Ok(Self::Explicit(id)),
            (None, Some(path)) => Ok(Self::LogFile(path)),
            (Some(_), Some(_)) => Err(CliError::config("give either a transaction id or an id file, not both")),
            (None, None) => Err(CliError::config("a transaction id or an id file is required")),
        }
    }

    pub fn resolve(&self) -> Result<TransactionId> {
        match self {
            Self::Explicit(id) => Ok(*id),
            Self::LogFile(path) => read_transaction_id(path),
            Self::StartResponse { database, response } => response.transaction_id(database),
        }
    }
}
