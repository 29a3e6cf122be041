//! Chunk loader: sends each allocated chunk file to its worker

use crate::api::FileLoad;
use crate::chunks::directive::LoadDirective;
use crate::chunks::report::{BatchReport, ChunkFailure, ChunkStep};
use crate::config::LoaderConfig;
use crate::error::{CliError, Result};
use crate::transaction::{ChunkPermit, TransactionCoordinator};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ChunkLoader {
    file_url_prefix: String,
    column_separator: String,
    concurrency: usize,
}

impl ChunkLoader {
    pub fn new(options: &LoaderConfig) -> Self {
        Self {
            file_url_prefix: options.file_url_prefix.clone(),
            column_separator: options.column_separator.clone(),
            concurrency: options.concurrency.max(1),
        }
    }

    /// Request body for one directive; overlap is read from the full path
    pub fn file_load(&self, directive: &LoadDirective) -> FileLoad {
        FileLoad {
            transaction_id: directive.transaction_id,
            table: directive.table.clone(),
            url: format!("{}{}", self.file_url_prefix, directive.path.display()),
            chunk: directive.chunk_id,
            column_separator: self.column_separator.clone(),
            overlap: directive.is_overlap(),
        }
    }

    /// Load one chunk under an already-held permit
    pub async fn load_one(
        &self,
        coordinator: &TransactionCoordinator,
        directive: &LoadDirective,
        permit: &ChunkPermit,
    ) -> Result<()> {
        if directive.transaction_id != permit.transaction_id() {
            return Err(CliError::not_open(format!(
                "directive for chunk {} references transaction {} but the open transaction is {}",
                directive.chunk_id,
                directive.transaction_id,
                permit.transaction_id()
            )));
        }

        let load = self.file_load(directive);
        coordinator
            .service()
            .load_file(&directive.worker, &load)
            .await?;

        debug!(
            chunk_id = directive.chunk_id,
            path = %directive.path.display(),
            worker = %directive.worker,
            overlap = load.overlap,
            "Loaded chunk"
        );
        Ok(())
    }

    /// Load every directive; failures are recorded and the rest still run
    pub async fn load_all(
        &self,
        coordinator: &TransactionCoordinator,
        directives: Vec<LoadDirective>,
        progress: &ProgressBar,
    ) -> BatchReport {
        let total = directives.len();
        info!(chunks = total, concurrency = self.concurrency, "Loading chunks");

        let results: Vec<std::result::Result<(), ChunkFailure>> = stream::iter(directives)
            .map(|directive| async move {
                let result = match coordinator.begin_chunk_request().await {
                    Ok(permit) => self.load_one(coordinator, &directive, &permit).await,
                    Err(e) => Err(e),
                };
                progress.inc(1);

                result.map_err(|e| ChunkFailure {
                    step: ChunkStep::Load,
                    chunk_id: Some(directive.chunk_id),
                    path: directive.path.clone(),
                    transaction_id: Some(directive.transaction_id),
                    error: e.to_string(),
                })
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::new();
        for result in results {
            match result {
                Ok(()) => report.record_success(),
                Err(failure) => report.record_failure(failure),
            }
        }

        info!(
            loaded = report.succeeded(),
            failed = report.failed(),
            "Chunk loading complete"
        );
        report
    }
}
