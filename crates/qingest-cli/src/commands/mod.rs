//! Command implementations

pub mod chunks;
pub mod database;
pub mod ingest;
pub mod table;
pub mod transaction;
pub mod version;
pub mod workflow;

use crate::api::{ApiClient, IngestService};
use crate::config::Config;
use crate::credential::CredentialResolver;
use crate::error::Result;
use std::sync::Arc;

/// Build the service client, resolving the credential once for the whole run
pub fn connect(config: &Config) -> Result<Arc<dyn IngestService>> {
    let credential = CredentialResolver::new(&config.auth_path).resolve()?;
    let client = ApiClient::from_config(config)?.with_credential(credential);
    Ok(Arc::new(client))
}
