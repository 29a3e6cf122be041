//! One-shot ingest of partitioned chunk directories
//!
//! Creates the database and table (unless they exist), opens one
//! transaction, allocates and loads every chunk, then commits. Any chunk
//! failure aborts the transaction so a partial catalog is never published.

use crate::api::{IngestService, TableSpec};
use crate::chunks::{scan_chunk_directory, ChunkAllocator, ChunkListing, ChunkLoader};
use crate::commands::database::partitioning;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::progress::{create_chunk_progress, create_spinner};
use crate::transaction::{started_line, TransactionCoordinator};
use crate::IngestArgs;
use colored::Colorize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn run(service: Arc<dyn IngestService>, config: &Config, args: IngestArgs) -> Result<()> {
    // Scan everything up front so a bad directory fails before any remote change
    let mut listing = ChunkListing::default();
    for dir in &args.dirs {
        listing.extend(scan_chunk_directory(dir)?);
    }
    if !listing.rejected.is_empty() {
        let report = listing.rejected_report();
        eprintln!(
            "{} {} chunk file(s) cannot be ingested; nothing was changed",
            "✗".red().bold(),
            report.failed()
        );
        return report.into_result();
    }
    let chunks = listing.chunks;
    if chunks.is_empty() {
        return Err(CliError::config(format!(
            "no chunk files found in {} director{}",
            args.dirs.len(),
            if args.dirs.len() == 1 { "y" } else { "ies" }
        )));
    }

    let table = if args.existing {
        None
    } else {
        let columns = args
            .columns
            .as_deref()
            .ok_or_else(|| CliError::config("--columns is required unless --existing is given"))?;
        Some(TableSpec::from_files(
            &args.database,
            &args.table,
            columns,
            args.params.as_deref(),
        )?)
    };

    let coordinator = TransactionCoordinator::new(service, &args.database);

    if let Some(table) = &table {
        let params = partitioning(&config.workflow.partitioning, args.stripes, args.sub_stripes, args.overlap);
        let spinner = create_spinner(&format!("Creating {}.{}", args.database, args.table));
        let result = async {
            coordinator.create_database(&params).await?;
            coordinator.create_table(table).await
        }
        .await;
        spinner.finish_and_clear();
        result?;
    }

    let transaction_id = coordinator.start_transaction().await?;
    println!("{}", started_line(transaction_id));

    let allocator = ChunkAllocator::new(&args.table, &config.loader).with_loader(ChunkLoader::new(&config.loader));
    let progress = create_chunk_progress(chunks.len() as u64, "Allocating and loading chunks");
    let outcome = allocator.run(&coordinator, chunks, &progress).await;
    progress.finish_and_clear();

    let report = outcome.report;
    if !report.is_complete() {
        warn!(
            transaction_id,
            failed = report.failed(),
            attempted = report.attempted(),
            "Chunk failures, aborting transaction"
        );
        if let Err(e) = coordinator.abort().await {
            error!(transaction_id, error = %e, "Abort failed; transaction left open");
        } else {
            eprintln!(
                "{} Aborted transaction {}: {} of {} chunk(s) failed",
                "✗".red().bold(),
                transaction_id,
                report.failed(),
                report.attempted()
            );
        }
        return report.into_result();
    }

    coordinator.commit(args.build_secondary_index).await?;
    println!("Committed transaction {}", transaction_id);

    if args.publish {
        let spinner = create_spinner(&format!("Publishing database {}", args.database));
        let result = coordinator.publish_database(args.consolidate_secondary_index).await;
        spinner.finish_and_clear();
        result?;
        println!("Published database {}", args.database);
    }

    info!(
        database = %args.database,
        table = %args.table,
        transaction_id,
        chunks = report.attempted(),
        "Ingest complete"
    );
    eprintln!(
        "{} Loaded {} chunk(s) into {}.{}",
        "✓".green().bold(),
        report.attempted(),
        args.database.cyan(),
        args.table.cyan()
    );
    Ok(())
}
