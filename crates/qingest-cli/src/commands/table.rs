//! Table registration command

use crate::api::{IngestService, TableSpec};
use crate::error::Result;
use crate::transaction::TransactionCoordinator;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn create(
    service: Arc<dyn IngestService>,
    database: String,
    table: String,
    columns: PathBuf,
    params: Option<PathBuf>,
) -> Result<()> {
    let spec = TableSpec::from_files(&database, &table, &columns, params.as_deref())?;
    let coordinator = TransactionCoordinator::new(service, &database);
    coordinator.create_table(&spec).await?;

    println!(
        "{} Table {}.{} ({} columns)",
        "✓".green().bold(),
        database.cyan(),
        table.cyan(),
        spec.columns.len()
    );
    Ok(())
}
