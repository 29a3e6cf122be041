//! Configuration for the qingest CLI
//!
//! Read from an optional `qingest.toml`, then overridden by environment
//! variables, then by command-line flags in `main`.

use crate::api::client::DEFAULT_API_TIMEOUT_SECS;
use crate::credential::DEFAULT_AUTH_PATH;
use crate::error::{CliError, Result};
use qingest_workflow::WorkflowSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Default ingest service URL when not configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:25080";

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "qingest.toml";

/// Default number of chunks allocated or loaded at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Settings for chunk allocation and loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Prepended to the chunk path to form the URL the worker reads
    pub file_url_prefix: String,
    pub column_separator: String,
    /// Replaces the port returned by allocation when the worker's ingest
    /// endpoint listens elsewhere
    pub worker_port: Option<u16>,
    pub concurrency: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            file_url_prefix: "file://".to_string(),
            column_separator: ",".to_string(),
            worker_port: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    /// Auth file holding the credential; `~` is expanded
    pub auth_path: String,
    pub timeout_secs: u64,
    pub loader: LoaderConfig,
    pub workflow: WorkflowSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            loader: LoaderConfig::default(),
            workflow: WorkflowSettings::default(),
        }
    }
}

impl Config {
    /// Load the config file (explicit path, or `qingest.toml` if present) and apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            },
            None => Self::default(),
        };

        config.merge_env()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply QINGEST_* environment overrides
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("QINGEST_SERVER_URL") {
            self.server_url = url;
        }

        if let Ok(path) = std::env::var("QINGEST_AUTH_PATH") {
            self.auth_path = path;
        }

        if let Ok(timeout) = std::env::var("QINGEST_API_TIMEOUT_SECS") {
            self.timeout_secs = timeout.parse().map_err(|_| {
                CliError::config(format!("QINGEST_API_TIMEOUT_SECS '{}' is not a number", timeout))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(CliError::config("server_url cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(CliError::config("timeout_secs must be positive"));
        }
        if self.loader.concurrency == 0 {
            return Err(CliError::config("loader.concurrency must be positive"));
        }
        if self.loader.column_separator.is_empty() {
            return Err(CliError::config("loader.column_separator cannot be empty"));
        }
        Ok(())
    }

    /// Set the server URL
    pub fn set_server_url(&mut self, url: String) {
        self.server_url = url;
    }
}
