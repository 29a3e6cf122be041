//! Super-transaction commands
//!
//! Each command is a separate process, so commit and abort resume the
//! transaction by id instead of sharing a coordinator with `start`.

use crate::api::IngestService;
use crate::config::Config;
use crate::error::Result;
use crate::transaction::{started_line, TransactionCoordinator, TransactionIdSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Start a transaction and print the line later stages scrape the id from
pub async fn start(service: Arc<dyn IngestService>, database: String) -> Result<()> {
    let coordinator = TransactionCoordinator::new(service, database);
    let id = coordinator.start_transaction().await?;
    println!("{}", started_line(id));
    Ok(())
}

pub async fn commit(
    service: Arc<dyn IngestService>,
    config: &Config,
    id: Option<u64>,
    id_file: Option<PathBuf>,
    build_secondary_index: bool,
) -> Result<()> {
    let id = TransactionIdSource::from_args(id, id_file)?.resolve()?;
    let coordinator = TransactionCoordinator::resume(service, &config.workflow.database, id);
    coordinator.commit(build_secondary_index).await?;

    info!(transaction_id = id, "Commit finished");
    println!("Committed transaction {}", id);
    Ok(())
}

pub async fn abort(
    service: Arc<dyn IngestService>,
    config: &Config,
    id: Option<u64>,
    id_file: Option<PathBuf>,
) -> Result<()> {
    let id = TransactionIdSource::from_args(id, id_file)?.resolve()?;
    let coordinator = TransactionCoordinator::resume(service, &config.workflow.database, id);
    coordinator.abort().await?;

    println!("Aborted transaction {}", id);
    Ok(())
}
