//! Ingest service request and response types
//!
//! Every request that changes state carries the credential in its
//! `auth_key` field. Every response is a JSON object with a `success` flag
//! (a boolean or `0`/`1`, depending on the server version) and an `error`
//! string on failure.

use crate::credential::Credential;
use crate::error::{CliError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Super-transaction identifier
pub type TransactionId = u64;

/// Chunk identifier, as encoded in `chunk_<id>` file names
pub type ChunkId = u32;

/// Response wrapper common to every endpoint.
///
/// Only the flag and error text are decoded here; the payload stays as raw
/// JSON until `success` has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}

/// `GET /meta/version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceVersion {
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_schema_version: Option<u64>,
}

/// Body carrying only the credential (commit, abort, publish)
#[derive(Debug, Serialize)]
pub struct AuthOnly<'a> {
    #[serde(rename = "auth_key")]
    pub credential: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateDatabaseRequest<'a> {
    pub database: &'a str,
    pub num_stripes: u32,
    pub num_sub_stripes: u32,
    pub overlap: f64,
    #[serde(rename = "auth_key")]
    pub credential: &'a str,
}

/// One column of a table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
}

/// Everything needed to register a table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSpec {
    pub database: String,
    pub table: String,
    /// Resolved columns; schema translation happens upstream
    pub columns: Vec<ColumnDef>,
    /// Extra parameters merged into the request body (`is_partitioned`,
    /// `chunk_id_key`, `director_table`, ...)
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl TableSpec {
    /// Load `--columns` and optional `--params` JSON files
    pub fn from_files(
        database: &str,
        table: &str,
        columns: &std::path::Path,
        params: Option<&std::path::Path>,
    ) -> Result<Self> {
        let columns: Vec<ColumnDef> = serde_json::from_str(&std::fs::read_to_string(columns)?)?;
        if columns.is_empty() {
            return Err(CliError::config(format!(
                "table '{}' has no columns",
                table
            )));
        }

        let params = match params {
            Some(path) => match serde_json::from_str(&std::fs::read_to_string(path)?)? {
                serde_json::Value::Object(map) => map,
                _ => {
                    return Err(CliError::config(format!(
                        "table parameters in '{}' must be a JSON object",
                        path.display()
                    )))
                },
            },
            None => serde_json::Map::new(),
        };

        Ok(Self {
            database: database.to_string(),
            table: table.to_string(),
            columns,
            params,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTableRequest<'a> {
    pub database: &'a str,
    pub table: &'a str,
    pub schema: &'a [ColumnDef],
    #[serde(flatten)]
    pub params: &'a serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "auth_key")]
    pub credential: &'a str,
}

#[derive(Debug, Serialize)]
pub struct StartTransactionRequest<'a> {
    pub database: &'a str,
    #[serde(rename = "auth_key")]
    pub credential: &'a str,
}

/// `POST /ingest/trans` payload: transactions nested under a database-keyed map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTransactionResponse {
    pub databases: BTreeMap<String, DatabaseTransactions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseTransactions {
    #[serde(default)]
    pub transactions: Vec<TransactionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub id: TransactionId,
}

impl StartTransactionResponse {
    /// The new transaction id started for `database`
    pub fn transaction_id(&self, database: &str) -> Result<TransactionId> {
        let entry = self.databases.get(database).ok_or_else(|| {
            CliError::config(format!(
                "start-transaction response carries no entry for database '{}'",
                database
            ))
        })?;

        entry
            .transactions
            .first()
            .map(|info| info.id)
            .ok_or_else(|| {
                CliError::config(format!(
                    "start-transaction response for '{}' carries no transaction id",
                    database
                ))
            })
    }
}

#[derive(Debug, Serialize)]
pub struct AllocateChunkRequest<'a> {
    pub transaction_id: TransactionId,
    pub chunk: ChunkId,
    #[serde(rename = "auth_key")]
    pub credential: &'a str,
}

/// Worker that owns a chunk for the rest of its transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerLocation {
    pub host: String,
    pub port: u16,
}

impl WorkerLocation {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Parse the `http://host:port` form used in load directives
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("http://")
            .unwrap_or(url)
            .trim_end_matches('/');
        let (host, port) = rest.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port.parse().ok()?))
    }
}

impl fmt::Display for WorkerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocateChunkResponse {
    pub location: WorkerLocation,
}

/// A single chunk file to ingest on a worker
#[derive(Debug, Clone, PartialEq)]
pub struct FileLoad {
    pub transaction_id: TransactionId,
    pub table: String,
    /// Location the worker reads from, e.g. `file:///data/chunks/chunk_12.txt`
    pub url: String,
    pub chunk: ChunkId,
    pub column_separator: String,
    pub overlap: bool,
}

#[derive(Debug, Serialize)]
pub struct LoadFileRequest<'a> {
    pub transaction_id: TransactionId,
    pub table: &'a str,
    pub url: &'a str,
    pub chunk: ChunkId,
    pub column_separator: &'a str,
    pub overlap: u8,
    #[serde(rename = "auth_key")]
    pub credential: &'a str,
}

impl<'a> LoadFileRequest<'a> {
    pub fn new(load: &'a FileLoad, credential: &'a Credential) -> Self {
        Self {
            transaction_id: load.transaction_id,
            table: &load.table,
            url: &load.url,
            chunk: load.chunk,
            column_separator: &load.column_separator,
            overlap: u8::from(load.overlap),
            credential: credential.expose(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use qingest_common::IngestError;
    use serde_json::json;

    #[test]
    fn test_envelope_accepts_numeric_flag() {
        let envelope: Envelope =
            serde_json::from_value(json!({"success": 0, "error": "no capacity"})).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("no capacity"));

        let envelope: Envelope = serde_json::from_value(json!({"success": true, "version": 12})).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.payload["version"], 12);
    }

    #[test]
    fn test_nested_transaction_id() {
        let envelope: Envelope = serde_json::from_value(json!({
            "success": true,
            "databases": {"db1": {"transactions": [{"id": 42}]}}
        }))
        .unwrap();
        let response: StartTransactionResponse =
            serde_json::from_value(serde_json::Value::Object(envelope.payload)).unwrap();

        assert_eq!(response.transaction_id("db1").unwrap(), 42);
        let err = response.transaction_id("other").unwrap_err();
        assert!(err.to_string().contains("'other'"));
    }

    #[test]
    fn test_transaction_id_for_other_database_rejected() {
        let response: StartTransactionResponse = serde_json::from_value(json!({
            "databases": {"other_db": {"transactions": [{"id": 5}]}}
        }))
        .unwrap();

        let err = response.transaction_id("db1").unwrap_err();
        assert!(matches!(err, CliError::Ingest(IngestError::Configuration(_))));
        assert!(err.to_string().contains("db1"));
    }

    #[test]
    fn test_missing_transaction_id() {
        let response = StartTransactionResponse {
            databases: BTreeMap::new(),
        };
        assert!(response.transaction_id("db1").is_err());
    }

    #[test]
    fn test_worker_location_url() {
        let worker = WorkerLocation::from_url("http://qserv-worker-07:25004").unwrap();
        assert_eq!(worker, WorkerLocation::new("qserv-worker-07", 25004));
        assert_eq!(worker.to_string(), "http://qserv-worker-07:25004");
        assert!(WorkerLocation::from_url("http://nowhere").is_none());
    }

    #[test]
    fn test_load_request_body() {
        let load = FileLoad {
            transaction_id: 7,
            table: "Object".into(),
            url: "file:///data/chunk_3_overlap.txt".into(),
            chunk: 3,
            column_separator: ",".into(),
            overlap: true,
        };
        let credential = Credential::new("s3cret");
        let body = serde_json::to_value(LoadFileRequest::new(&load, &credential)).unwrap();

        assert_eq!(body["overlap"], 1);
        assert_eq!(body["auth_key"], "s3cret");
        assert_eq!(body["chunk"], 3);
    }

    #[test]
    fn test_table_request_flattens_params() {
        let mut params = serde_json::Map::new();
        params.insert("is_partitioned".into(), json!(1));
        let columns = vec![ColumnDef {
            name: "objectId".into(),
            sql_type: "BIGINT NOT NULL".into(),
        }];
        let body = serde_json::to_value(CreateTableRequest {
            database: "db1",
            table: "Object",
            schema: &columns,
            params: &params,
            credential: "k",
        })
        .unwrap();

        assert_eq!(body["is_partitioned"], 1);
        assert_eq!(body["schema"][0]["type"], "BIGINT NOT NULL");
    }
}
