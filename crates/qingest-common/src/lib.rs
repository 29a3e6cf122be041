//! Qingest Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the qingest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`IngestError`] taxonomy shared by the workflow
//!   compiler and the ingest-service client
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use qingest_common::logging::{init_logging, LogConfig};
//! use qingest_common::{IngestError, Result};
//!
//! fn start() -> Result<()> {
//!     let config = LogConfig::from_env()
//!         .map_err(|e| IngestError::configuration(e.to_string()))?;
//!     init_logging(&config).map_err(|e| IngestError::configuration(e.to_string()))?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{IngestError, Result};
