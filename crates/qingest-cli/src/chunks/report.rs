//! Per-batch outcome of chunk allocation and loading

use crate::api::{ChunkId, TransactionId};
use crate::error::{CliError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStep {
    Scan,
    Allocate,
    Load,
}

impl fmt::Display for ChunkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStep::Scan => f.write_str("scan"),
            ChunkStep::Allocate => f.write_str("allocate"),
            ChunkStep::Load => f.write_str("load"),
        }
    }
}

/// Everything needed to retry one chunk by hand
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub step: ChunkStep,
    /// Absent when the file name carries no usable chunk id
    pub chunk_id: Option<ChunkId>,
    pub path: PathBuf,
    pub transaction_id: Option<TransactionId>,
    pub error: String,
}

#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    attempted: usize,
    failures: Vec<ChunkFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
    }

    /// Count and log a failed chunk; the batch carries on
    pub fn record_failure(&mut self, failure: ChunkFailure) {
        self.attempted += 1;
        error!(
            step = %failure.step,
            chunk_id = ?failure.chunk_id,
            path = %failure.path.display(),
            transaction_id = ?failure.transaction_id,
            error = %failure.error,
            "Chunk {} failed",
            failure.step
        );
        self.failures.push(failure);
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn failures(&self) -> &[ChunkFailure] {
        &self.failures
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// `PartialFailure` if any chunk failed
    pub fn into_result(self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(CliError::PartialFailure {
                failed: self.failed(),
                total: self.attempted,
            })
        }
    }
}
