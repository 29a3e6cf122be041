//! Stage model
//!
//! A stage is one job of the compiled workflow. Stages are created by the
//! builder and never change afterwards.

use crate::artifact::ArtifactId;
use crate::resources::ResourceClass;
use serde::{Deserialize, Serialize};

/// Index of a stage inside its workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub(crate) usize);

impl StageId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Every kind of job the compiler emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    CreateDatabase,
    CreateTable,
    StartTransaction,
    NormalizeTypes,
    ConvertFormat,
    Clean,
    Partition,
    /// Allocates every chunk of a directory and loads it in the same job
    AllocateAndLoad,
    /// Allocates chunks and writes load directives for a later `load` stage
    AllocateChunks,
    Load,
    CommitTransaction,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            StageKind::CreateDatabase => "create-database",
            StageKind::CreateTable => "create-table",
            StageKind::StartTransaction => "start-transaction",
            StageKind::NormalizeTypes => "normalize-types",
            StageKind::ConvertFormat => "convert-format",
            StageKind::Clean => "clean",
            StageKind::Partition => "partition",
            StageKind::AllocateAndLoad => "allocate-and-load",
            StageKind::AllocateChunks => "allocate-chunks",
            StageKind::Load => "load",
            StageKind::CommitTransaction => "commit-transaction",
        }
    }

    /// Database lifecycle stages shared by every input file
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            StageKind::CreateDatabase
                | StageKind::CreateTable
                | StageKind::StartTransaction
                | StageKind::CommitTransaction
        )
    }

    /// Stages that issue per-chunk requests inside the open transaction
    pub fn is_chunk_directed(self) -> bool {
        matches!(
            self,
            StageKind::AllocateAndLoad | StageKind::AllocateChunks | StageKind::Load
        )
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One command-line argument of a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
    Literal(String),
    Artifact(ArtifactId),
}

impl Argument {
    pub fn literal(value: impl ToString) -> Self {
        Argument::Literal(value.to_string())
    }
}

/// A unit of work in the compiled graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    /// Unique job name, e.g. `partition-3`
    pub name: String,
    pub kind: StageKind,
    /// External program the scheduler launches
    pub program: String,
    pub arguments: Vec<Argument>,
    pub inputs: Vec<ArtifactId>,
    pub outputs: Vec<ArtifactId>,
    /// Stdout and stderr of the job
    pub log: ArtifactId,
    /// Set when stdout is itself the primary output (the `clean` filter)
    pub stdout: Option<ArtifactId>,
    pub resources: ResourceClass,
    pub parents: Vec<StageId>,
    /// 1-based position of the input file this stage belongs to
    pub file_index: Option<usize>,
}

impl Stage {
    /// Every artifact the stage references, in declaration order
    pub fn referenced_artifacts(&self) -> impl Iterator<Item = ArtifactId> + '_ {
        let from_args = self.arguments.iter().filter_map(|arg| match arg {
            Argument::Artifact(id) => Some(*id),
            Argument::Literal(_) => None,
        });
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .copied()
            .chain(std::iter::once(self.log))
            .chain(self.stdout)
            .chain(from_args)
    }

    /// Artifacts this stage writes: declared outputs, log, redirected stdout
    pub fn written_artifacts(&self) -> impl Iterator<Item = ArtifactId> + '_ {
        self.outputs
            .iter()
            .copied()
            .chain(std::iter::once(self.log))
            .chain(self.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(StageKind::StartTransaction.is_lifecycle());
        assert!(!StageKind::Partition.is_lifecycle());
        assert!(StageKind::AllocateAndLoad.is_chunk_directed());
        assert!(StageKind::Load.is_chunk_directed());
        assert!(!StageKind::Clean.is_chunk_directed());
        assert_eq!(StageKind::AllocateAndLoad.to_string(), "allocate-and-load");
    }

    #[test]
    fn test_referenced_artifacts_include_log_and_args() {
        let stage = Stage {
            id: StageId(4),
            name: "clean-1".into(),
            kind: StageKind::Clean,
            program: "sed".into(),
            arguments: vec![Argument::literal("-f"), Argument::Artifact(ArtifactId(1)), Argument::Artifact(ArtifactId(5))],
            inputs: vec![ArtifactId(1), ArtifactId(5)],
            outputs: vec![],
            log: ArtifactId(7),
            stdout: Some(ArtifactId(6)),
            resources: ResourceClass::Small,
            parents: vec![StageId(3)],
            file_index: Some(1),
        };

        let referenced: Vec<_> = stage.referenced_artifacts().collect();
        assert!(referenced.contains(&ArtifactId(7)));
        assert!(referenced.contains(&ArtifactId(6)));

        let written: Vec<_> = stage.written_artifacts().collect();
        assert_eq!(written, vec![ArtifactId(7), ArtifactId(6)]);
    }
}
