//! Resource classes attached to stages
//!
//! Classes are scheduler hints only; nothing in qingest enforces them.

use crate::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Memory tier requested for a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl ResourceClass {
    /// Memory request in MiB
    pub fn memory_mib(self) -> u64 {
        match self {
            ResourceClass::Small => 1024,
            ResourceClass::Medium => 4096,
            ResourceClass::Large => 16384,
            ResourceClass::Xlarge => 65536,
        }
    }
}

impl std::str::FromStr for ResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" => Ok(ResourceClass::Small),
            "medium" => Ok(ResourceClass::Medium),
            "large" => Ok(ResourceClass::Large),
            "xlarge" => Ok(ResourceClass::Xlarge),
            _ => Err(format!("unknown resource class '{}'", s)),
        }
    }
}

/// Maps each stage kind to its resource class.
///
/// Whole catalog files are held in memory by the type-fixing and
/// partitioning jobs, so those default to `large`; jobs that only talk to
/// the ingest service stay `small`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePolicy {
    overrides: HashMap<StageKind, ResourceClass>,
}

impl ResourcePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, kind: StageKind, class: ResourceClass) -> Self {
        self.overrides.insert(kind, class);
        self
    }

    pub fn default_class(kind: StageKind) -> ResourceClass {
        match kind {
            StageKind::NormalizeTypes | StageKind::Partition => ResourceClass::Large,
            StageKind::ConvertFormat => ResourceClass::Medium,
            StageKind::Clean
            | StageKind::CreateDatabase
            | StageKind::CreateTable
            | StageKind::StartTransaction
            | StageKind::AllocateAndLoad
            | StageKind::AllocateChunks
            | StageKind::Load
            | StageKind::CommitTransaction => ResourceClass::Small,
        }
    }

    pub fn class_for(&self, kind: StageKind) -> ResourceClass {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_class(kind))
    }
}
