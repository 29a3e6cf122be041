//! Chunk allocation inside the open transaction
//!
//! Each chunk file gets one allocation request. A successful allocation
//! yields a [`LoadDirective`]; with a loader attached, the chunk is loaded
//! straight away under the same permit, so its load never precedes its
//! allocation. Chunks are independent and run concurrently.

use crate::api::WorkerLocation;
use crate::chunks::directive::LoadDirective;
use crate::chunks::load::ChunkLoader;
use crate::chunks::report::{BatchReport, ChunkFailure, ChunkStep};
use crate::chunks::scan::ChunkFile;
use crate::config::LoaderConfig;
use crate::transaction::TransactionCoordinator;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, info};

/// Directives for the chunks that were allocated, plus the batch report
#[derive(Debug, Default)]
pub struct AllocationOutcome {
    pub directives: Vec<LoadDirective>,
    pub report: BatchReport,
}

struct ChunkResult {
    directive: Option<LoadDirective>,
    failure: Option<ChunkFailure>,
}

pub struct ChunkAllocator {
    table: String,
    worker_port: Option<u16>,
    concurrency: usize,
    loader: Option<ChunkLoader>,
}

impl ChunkAllocator {
    pub fn new(table: impl Into<String>, options: &LoaderConfig) -> Self {
        Self {
            table: table.into(),
            worker_port: options.worker_port,
            concurrency: options.concurrency.max(1),
            loader: None,
        }
    }

    /// Load each chunk as soon as it is allocated
    pub fn with_loader(mut self, loader: ChunkLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    fn worker(&self, allocated: WorkerLocation) -> WorkerLocation {
        match self.worker_port {
            Some(port) => WorkerLocation::new(allocated.host, port),
            None => allocated,
        }
    }

    pub async fn run(
        &self,
        coordinator: &TransactionCoordinator,
        chunks: Vec<ChunkFile>,
        progress: &ProgressBar,
    ) -> AllocationOutcome {
        info!(
            chunks = chunks.len(),
            table = %self.table,
            load = self.loader.is_some(),
            concurrency = self.concurrency,
            "Allocating chunks"
        );

        let results: Vec<ChunkResult> = stream::iter(chunks)
            .map(|chunk| async move {
                let result = self.process(coordinator, chunk).await;
                progress.inc(1);
                result
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = AllocationOutcome::default();
        for result in results {
            match result.failure {
                Some(failure) => outcome.report.record_failure(failure),
                None => outcome.report.record_success(),
            }
            outcome.directives.extend(result.directive);
        }
        outcome
            .directives
            .sort_by(|a, b| (a.chunk_id, &a.path).cmp(&(b.chunk_id, &b.path)));

        info!(
            allocated = outcome.directives.len(),
            failed = outcome.report.failed(),
            "Chunk allocation complete"
        );
        outcome
    }

    async fn process(&self, coordinator: &TransactionCoordinator, chunk: ChunkFile) -> ChunkResult {
        let failure = |step, transaction_id, error: String| ChunkFailure {
            step,
            chunk_id: Some(chunk.chunk_id),
            path: chunk.path.clone(),
            transaction_id,
            error,
        };

        let permit = match coordinator.begin_chunk_request().await {
            Ok(permit) => permit,
            Err(e) => {
                return ChunkResult {
                    directive: None,
                    failure: Some(failure(ChunkStep::Allocate, None, e.to_string())),
                }
            },
        };
        let transaction_id = permit.transaction_id();

        let allocated = match coordinator
            .service()
            .allocate_chunk(transaction_id, chunk.chunk_id)
            .await
        {
            Ok(location) => location,
            Err(e) => {
                return ChunkResult {
                    directive: None,
                    failure: Some(failure(ChunkStep::Allocate, Some(transaction_id), e.to_string())),
                }
            },
        };

        let directive = LoadDirective {
            worker: self.worker(allocated),
            transaction_id,
            table: self.table.clone(),
            path: chunk.path.clone(),
            chunk_id: chunk.chunk_id,
        };
        debug!(chunk_id = chunk.chunk_id, worker = %directive.worker, "Allocated chunk");

        let load_failure = match &self.loader {
            Some(loader) => loader
                .load_one(coordinator, &directive, &permit)
                .await
                .err()
                .map(|e| failure(ChunkStep::Load, Some(transaction_id), e.to_string())),
            None => None,
        };

        ChunkResult {
            directive: Some(directive),
            failure: load_failure,
        }
    }
}
