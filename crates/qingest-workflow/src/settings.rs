//! Workflow compilation settings
//!
//! Deserialized from the `[workflow]` section of `qingest.toml`; every field
//! has a default so an empty section is valid.

use crate::resources::ResourcePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Spherical partitioning parameters shared by `create-database` and the partitioner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitioningParams {
    pub num_stripes: u32,
    pub num_sub_stripes: u32,
    /// Chunk/sub-chunk overlap radius in degrees
    pub overlap: f64,
}

impl Default for PartitioningParams {
    fn default() -> Self {
        Self {
            num_stripes: 340,
            num_sub_stripes: 3,
            overlap: 0.01667,
        }
    }
}

/// How chunk loading is laid out in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// One `allocate-and-load` stage per file
    #[default]
    Inline,
    /// `allocate-chunks` writes directives, a separate `load` stage consumes them
    Deferred,
}

/// External programs launched by the processing stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Programs {
    pub normalize_types: String,
    pub convert_format: String,
    pub clean: String,
    pub partition: String,
    /// The qingest binary itself, used by lifecycle and chunk stages
    pub ingest: String,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            normalize_types: "hackTypes".to_string(),
            convert_format: "pq2csv".to_string(),
            clean: "sed".to_string(),
            partition: "sph-partition".to_string(),
            ingest: "qingest".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Name recorded in the workflow description
    pub name: String,
    /// Target catalog (database) name
    pub database: String,
    pub table: String,
    pub partitioning: PartitioningParams,

    /// Schema descriptor read by the format converter
    pub schema_descriptor: String,
    /// Script applied by the `clean` stage
    pub fix_script: String,
    /// Partitioner configuration
    pub partition_config: String,
    /// Resolved column definitions for `create-table`
    pub table_columns: String,
    /// Extra table parameters for `create-table`
    pub table_params: String,

    /// Parent directory of the per-file chunk directories
    pub chunk_base_dir: PathBuf,
    pub programs: Programs,
    pub load_mode: LoadMode,

    /// Emit a `commit-transaction` stage after every branch
    pub commit: bool,
    pub build_secondary_index: bool,

    /// Require every listed input to be readable when compiling; turn off
    /// when inputs only exist on the batch cluster
    pub verify_inputs: bool,

    pub resources: ResourcePolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            name: "qingest".to_string(),
            database: "hsc_rc2_w_2020_14_00".to_string(),
            table: "Object".to_string(),
            partitioning: PartitioningParams::default(),
            schema_descriptor: "schema.abh".to_string(),
            fix_script: "fixCsv.sed".to_string(),
            partition_config: "Object_new.cfg".to_string(),
            table_columns: "columns.json".to_string(),
            table_params: "table.json".to_string(),
            chunk_base_dir: PathBuf::from("chunks"),
            programs: Programs::default(),
            load_mode: LoadMode::Inline,
            commit: true,
            build_secondary_index: false,
            verify_inputs: true,
            resources: ResourcePolicy::default(),
        }
    }
}
