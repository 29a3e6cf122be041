//! Chunk allocation and loading commands

use crate::api::IngestService;
use crate::chunks::{
    read_manifest, scan_chunk_directory, write_manifest, ChunkAllocator, ChunkLoader, LoadDirective,
};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::progress::create_chunk_progress;
use crate::transaction::{TransactionCoordinator, TransactionIdSource};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Flags of `chunks allocate`
#[derive(Debug, Clone)]
pub struct AllocateOptions {
    pub dir: PathBuf,
    pub id: Option<u64>,
    pub id_file: Option<PathBuf>,
    pub table: Option<String>,
    pub output: Option<PathBuf>,
    pub load: bool,
}

pub async fn allocate(service: Arc<dyn IngestService>, config: &Config, options: AllocateOptions) -> Result<()> {
    let transaction_id = TransactionIdSource::from_args(options.id, options.id_file)?.resolve()?;
    let listing = scan_chunk_directory(&options.dir)?;
    if listing.is_empty() {
        warn!(dir = %options.dir.display(), "No chunk files found");
    }

    let table = options.table.unwrap_or_else(|| config.workflow.table.clone());
    let coordinator = TransactionCoordinator::resume(service, &config.workflow.database, transaction_id);

    let mut allocator = ChunkAllocator::new(&table, &config.loader);
    if options.load {
        allocator = allocator.with_loader(ChunkLoader::new(&config.loader));
    }

    let message = if options.load { "Allocating and loading chunks" } else { "Allocating chunks" };
    let mut report = listing.rejected_report();
    let progress = create_chunk_progress(listing.chunks.len() as u64, message);
    let outcome = allocator.run(&coordinator, listing.chunks, &progress).await;
    progress.finish_and_clear();
    report.merge(outcome.report);

    match &options.output {
        Some(path) => {
            write_manifest(path, &outcome.directives)?;
            info!(
                manifest = %path.display(),
                directives = outcome.directives.len(),
                "Wrote load directives"
            );
        },
        None => {
            for directive in &outcome.directives {
                println!("{}", directive);
            }
        },
    }

    report_summary(report.succeeded(), report.attempted());
    report.into_result()
}

pub async fn load(service: Arc<dyn IngestService>, config: &Config, manifest: PathBuf) -> Result<()> {
    let directives = read_manifest(&manifest)?;
    if directives.is_empty() {
        warn!(manifest = %manifest.display(), "Manifest lists no chunks");
        return Ok(());
    }

    let transaction_id = single_transaction(&directives)?;
    let coordinator = TransactionCoordinator::resume(service, &config.workflow.database, transaction_id);
    let loader = ChunkLoader::new(&config.loader);

    let progress = create_chunk_progress(directives.len() as u64, "Loading chunks");
    let report = loader.load_all(&coordinator, directives, &progress).await;
    progress.finish_and_clear();

    report_summary(report.succeeded(), report.attempted());
    report.into_result()
}

/// The one transaction every directive of a manifest belongs to
fn single_transaction(directives: &[LoadDirective]) -> Result<u64> {
    let ids: BTreeSet<u64> = directives.iter().map(|d| d.transaction_id).collect();
    let mut iter = ids.iter();
    match (iter.next(), iter.next()) {
        (Some(id), None) => Ok(*id),
        _ => Err(CliError::config(format!(
            "manifest mixes transactions {:?}; load each transaction separately",
            ids
        ))),
    }
}

fn report_summary(succeeded: usize, attempted: usize) {
    if succeeded == attempted {
        eprintln!("{} {} chunk(s) done", "✓".green().bold(), attempted);
    } else {
        eprintln!(
            "{} {} of {} chunk(s) failed",
            "✗".red().bold(),
            attempted - succeeded,
            attempted
        );
    }
}
