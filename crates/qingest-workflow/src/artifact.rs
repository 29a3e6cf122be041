//! Artifact registry
//!
//! Every file, directory, and log a stage touches is declared here exactly
//! once, either as a pre-existing input or as the output of one stage.

use crate::stage::StageId;
use qingest_common::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of an artifact inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub(crate) usize);

impl ArtifactId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Catalog file listed in the input list
    InputCatalogFile,
    /// Shared configuration consumed by many stages (schema, scripts, table params)
    ConfigFile,
    /// Input with column types normalized
    HackedFile,
    /// Output of the format conversion
    ConvertedFile,
    CleanedFile,
    /// Directory of `chunk_<id>` files written by the partitioner
    ChunkDirectory,
    /// Load directives written by chunk allocation; doubles as the per-file completion marker
    LoadManifest,
    /// Log of `start-transaction`, carries the `Started transaction <id>` line
    TransactionLog,
    GenericLog,
}

impl ArtifactKind {
    pub fn is_log(self) -> bool {
        matches!(self, ArtifactKind::TransactionLog | ArtifactKind::GenericLog)
    }
}

/// A named data object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub name: String,
    pub kind: ArtifactKind,
    /// `None` for files that exist before the workflow runs
    pub produced_by: Option<StageId>,
}

/// Declares artifacts and resolves them by id or name
#[derive(Debug, Default, Clone)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
    by_name: HashMap<String, ArtifactId>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a pre-existing input
    pub fn declare_input(&mut self, name: impl Into<String>, kind: ArtifactKind) -> Result<ArtifactId> {
        self.declare(name.into(), kind, None)
    }

    /// Declare an artifact written by `producer`
    pub fn declare_output(
        &mut self,
        name: impl Into<String>,
        kind: ArtifactKind,
        producer: StageId,
    ) -> Result<ArtifactId> {
        self.declare(name.into(), kind, Some(producer))
    }

    fn declare(&mut self, name: String, kind: ArtifactKind, produced_by: Option<StageId>) -> Result<ArtifactId> {
        if name.trim().is_empty() {
            return Err(IngestError::invalid_graph("artifact name cannot be empty"));
        }
        if self.by_name.contains_key(&name) {
            return Err(IngestError::invalid_graph(format!(
                "artifact '{}' declared more than once",
                name
            )));
        }

        let id = ArtifactId(self.artifacts.len());
        self.by_name.insert(name.clone(), id);
        self.artifacts.push(Artifact {
            id,
            name,
            kind,
            produced_by,
        });
        Ok(id)
    }

    pub fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.get(id.0)
    }

    pub fn lookup(&self, name: &str) -> Option<&Artifact> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    pub fn contains(&self, id: ArtifactId) -> bool {
        id.0 < self.artifacts.len()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub(crate) fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}
