//! Qingest workflow compiler
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Compiles a list of catalog input files into the stage graph an external
//! batch scheduler runs to load them into a partitioned database.
//!
//! # Overview
//!
//! For every input file the graph holds one independent branch:
//!
//! ```text
//! normalize-types -> convert-format -> clean -> partition -> allocate-and-load
//! ```
//!
//! and the branches share the database lifecycle stages
//! `create-database -> create-table -> start-transaction` (plus an optional
//! `commit-transaction` after every branch). The allocation stage of each
//! branch also waits on `start-transaction` and reads the transaction id
//! from its log.
//!
//! # Example
//!
//! ```no_run
//! use qingest_workflow::{read_input_list, WorkflowBuilder, WorkflowSettings};
//!
//! fn compile() -> qingest_common::Result<()> {
//!     let inputs = read_input_list("inparq.list")?;
//!     let workflow = WorkflowBuilder::new(WorkflowSettings::default()).build(&inputs)?;
//!     std::fs::write("workflow.yaml", workflow.to_yaml()?)?;
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod builder;
pub mod graph;
pub mod resources;
pub mod settings;
pub mod stage;

pub use artifact::{Artifact, ArtifactId, ArtifactKind, ArtifactRegistry};
pub use builder::{read_input_list, WorkflowBuilder};
pub use graph::{Edge, Workflow, WorkflowDescription};
pub use resources::{ResourceClass, ResourcePolicy};
pub use settings::{LoadMode, PartitioningParams, Programs, WorkflowSettings};
pub use stage::{Argument, Stage, StageId, StageKind};
