//! HTTP client for the ingest service

use crate::api::{endpoints, types::*, IngestService};
use crate::config::Config;
use crate::credential::Credential;
use crate::error::{CliError, Result};
use async_trait::async_trait;
use qingest_common::IngestError;
use qingest_workflow::PartitioningParams;
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// API Client Constants
// ============================================================================

/// Default timeout for API requests in seconds.
/// Can be overridden via `timeout_secs` or QINGEST_API_TIMEOUT_SECS.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 300;

/// Longest slice of an unparseable body quoted back in an error
const BODY_EXCERPT_LEN: usize = 200;

pub struct ApiClient {
    client: Client,
    base_url: String,
    credential: Option<Credential>,
}

impl ApiClient {
    /// Create a client without a credential; only `version` works until one is attached
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            credential: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.server_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Attach the credential sent as `auth_key` with every state-changing request
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credential(&self) -> Result<&Credential> {
        self.credential.as_ref().ok_or_else(|| {
            IngestError::CredentialUnavailable("no credential was resolved for this run".to_string())
                .into()
        })
    }

    /// Send a request and decode the payload of a successful response
    async fn call<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| {
            let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
            CliError::remote(
                operation,
                format!("HTTP {} with unreadable body ({}): {}", status, e, excerpt),
            )
        })?;

        if !envelope.success {
            let message = envelope
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("HTTP {} without error text", status));
            return Err(CliError::remote(operation, message));
        }

        debug!(operation, status = %status, "Request succeeded");

        serde_json::from_value(serde_json::Value::Object(envelope.payload))
            .map_err(|e| CliError::remote(operation, format!("unexpected response shape: {}", e)))
    }
}

#[async_trait]
impl IngestService for ApiClient {
    async fn version(&self) -> Result<ServiceVersion> {
        let url = endpoints::version_url(&self.base_url);
        debug!(url = %url, "Fetching service version");

        self.call("version", self.client.get(&url)).await
    }

    async fn create_database(&self, database: &str, partitioning: &PartitioningParams) -> Result<()> {
        let url = endpoints::database_url(&self.base_url);
        let request = CreateDatabaseRequest {
            database,
            num_stripes: partitioning.num_stripes,
            num_sub_stripes: partitioning.num_sub_stripes,
            overlap: partitioning.overlap,
            credential: self.credential()?.expose(),
        };

        let _: IgnoredAny = self
            .call("create-database", self.client.post(&url).json(&request))
            .await?;
        Ok(())
    }

    async fn publish_database(&self, database: &str, consolidate_secondary_index: bool) -> Result<()> {
        let url = endpoints::database_publish_url(&self.base_url, database, consolidate_secondary_index);
        let body = AuthOnly {
            credential: self.credential()?.expose(),
        };

        let _: IgnoredAny = self
            .call("publish-database", self.client.put(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn create_table(&self, table: &TableSpec) -> Result<()> {
        let url = endpoints::table_url(&self.base_url);
        let request = CreateTableRequest {
            database: &table.database,
            table: &table.table,
            schema: &table.columns,
            params: &table.params,
            credential: self.credential()?.expose(),
        };

        let _: IgnoredAny = self
            .call("create-table", self.client.post(&url).json(&request))
            .await?;
        Ok(())
    }

    async fn start_transaction(&self, database: &str) -> Result<TransactionId> {
        let url = endpoints::transaction_url(&self.base_url);
        let request = StartTransactionRequest {
            database,
            credential: self.credential()?.expose(),
        };

        let response: StartTransactionResponse = self
            .call("start-transaction", self.client.post(&url).json(&request))
            .await?;
        response.transaction_id(database)
    }

    async fn finish_transaction(
        &self,
        id: TransactionId,
        abort: bool,
        build_secondary_index: bool,
    ) -> Result<()> {
        let url = endpoints::transaction_finish_url(&self.base_url, id, abort, build_secondary_index);
        let body = AuthOnly {
            credential: self.credential()?.expose(),
        };
        let operation = if abort { "abort-transaction" } else { "commit-transaction" };

        let _: IgnoredAny = self.call(operation, self.client.put(&url).json(&body)).await?;
        Ok(())
    }

    async fn allocate_chunk(&self, id: TransactionId, chunk: ChunkId) -> Result<WorkerLocation> {
        let url = endpoints::chunk_url(&self.base_url);
        let request = AllocateChunkRequest {
            transaction_id: id,
            chunk,
            credential: self.credential()?.expose(),
        };

        let response: AllocateChunkResponse = self
            .call("allocate-chunk", self.client.post(&url).json(&request))
            .await?;
        Ok(response.location)
    }

    async fn load_file(&self, worker: &WorkerLocation, load: &FileLoad) -> Result<()> {
        let url = endpoints::worker_file_url(worker);
        let request = LoadFileRequest::new(load, self.credential()?);

        let _: IgnoredAny = self
            .call("load-file", self.client.post(&url).json(&request))
            .await?;
        Ok(())
    }
}
