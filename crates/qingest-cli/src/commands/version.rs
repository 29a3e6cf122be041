//! Service version command

use crate::api::{ApiClient, IngestService};
use crate::config::Config;
use crate::error::Result;

pub async fn run(config: &Config) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let version = client.version().await?;

    println!("Ingest service: {}", client.base_url());
    println!("API version:    {}", version.version);
    if let Some(schema) = version.database_schema_version {
        println!("Schema version: {}", schema);
    }

    Ok(())
}
