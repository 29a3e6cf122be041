//! Ingest service API
//!
//! [`IngestService`] is the seam between the coordinator/chunk protocol and
//! the HTTP client, so both can be driven against a mock server in tests.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::ApiClient;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use qingest_workflow::PartitioningParams;

#[async_trait]
pub trait IngestService: Send + Sync {
    async fn version(&self) -> Result<ServiceVersion>;

    async fn create_database(&self, database: &str, partitioning: &PartitioningParams) -> Result<()>;

    async fn publish_database(&self, database: &str, consolidate_secondary_index: bool) -> Result<()>;

    async fn create_table(&self, table: &TableSpec) -> Result<()>;

    /// Open a super-transaction and return its id
    async fn start_transaction(&self, database: &str) -> Result<TransactionId>;

    /// Commit (`abort = false`) or abort a super-transaction
    async fn finish_transaction(
        &self,
        id: TransactionId,
        abort: bool,
        build_secondary_index: bool,
    ) -> Result<()>;

    async fn allocate_chunk(&self, id: TransactionId, chunk: ChunkId) -> Result<WorkerLocation>;

    async fn load_file(&self, worker: &WorkerLocation, load: &FileLoad) -> Result<()>;
}
