//! Database lifecycle commands

use crate::api::IngestService;
use crate::config::Config;
use crate::error::Result;
use crate::progress::create_spinner;
use crate::transaction::TransactionCoordinator;
use colored::Colorize;
use qingest_workflow::PartitioningParams;
use std::sync::Arc;

/// Partitioning from the config file with command-line overrides applied
pub fn partitioning(
    base: &PartitioningParams,
    stripes: Option<u32>,
    sub_stripes: Option<u32>,
    overlap: Option<f64>,
) -> PartitioningParams {
    PartitioningParams {
        num_stripes: stripes.unwrap_or(base.num_stripes),
        num_sub_stripes: sub_stripes.unwrap_or(base.num_sub_stripes),
        overlap: overlap.unwrap_or(base.overlap),
    }
}

pub async fn create(
    service: Arc<dyn IngestService>,
    config: &Config,
    database: String,
    stripes: Option<u32>,
    sub_stripes: Option<u32>,
    overlap: Option<f64>,
) -> Result<()> {
    let params = partitioning(&config.workflow.partitioning, stripes, sub_stripes, overlap);
    let coordinator = TransactionCoordinator::new(service, &database);

    let spinner = create_spinner(&format!("Creating database {}", database));
    let result = coordinator.create_database(&params).await;
    spinner.finish_and_clear();
    result?;

    println!(
        "{} Database {} ({} stripes, {} sub-stripes, overlap {})",
        "✓".green().bold(),
        database.cyan(),
        params.num_stripes,
        params.num_sub_stripes,
        params.overlap
    );
    Ok(())
}

pub async fn publish(service: Arc<dyn IngestService>, database: String, consolidate_secondary_index: bool) -> Result<()> {
    let coordinator = TransactionCoordinator::new(service, &database);

    let spinner = create_spinner(&format!("Publishing database {}", database));
    let result = coordinator.publish_database(consolidate_secondary_index).await;
    spinner.finish_and_clear();
    result?;

    println!("{} Published database {}", "✓".green().bold(), database.cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioning_overrides() {
        let base = PartitioningParams::default();
        let params = partitioning(&base, Some(85), None, Some(0.05));
        assert_eq!(params.num_stripes, 85);
        assert_eq!(params.num_sub_stripes, base.num_sub_stripes);
        assert_eq!(params.overlap, 0.05);
    }

    #[test]
    fn test_partitioning_defaults() {
        let base = PartitioningParams::default();
        assert_eq!(partitioning(&base, None, None, None), base);
    }
}
