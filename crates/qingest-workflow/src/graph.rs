//! Immutable workflow graph
//!
//! [`Workflow::freeze`] validates the collected stages once and is the only
//! way to obtain a [`Workflow`]. A frozen workflow is guaranteed to be:
//!
//! - acyclic (a topological order exists and is stored)
//! - closed: every artifact a stage references is declared
//! - causal: every artifact a stage consumes is either a pre-existing input
//!   or written by one of its ancestors

use crate::artifact::{Artifact, ArtifactId, ArtifactRegistry};
use crate::resources::ResourceClass;
use crate::stage::{Argument, Stage, StageId, StageKind};
use chrono::{DateTime, Utc};
use qingest_common::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Dependency edge: `child` runs only after `parent` produced its outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub parent: StageId,
    pub child: StageId,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    generated_at: DateTime<Utc>,
    artifacts: Vec<Artifact>,
    stages: Vec<Stage>,
    edges: Vec<Edge>,
    order: Vec<StageId>,
}

impl Workflow {
    /// Validate and freeze a collected graph
    pub fn freeze(name: impl Into<String>, registry: ArtifactRegistry, stages: Vec<Stage>) -> Result<Self> {
        for (index, stage) in stages.iter().enumerate() {
            if stage.id.index() != index {
                return Err(IngestError::invalid_graph(format!(
                    "stage '{}' has id {} but sits at position {}",
                    stage.name,
                    stage.id.index(),
                    index
                )));
            }
        }

        let mut edges = Vec::new();
        for stage in &stages {
            for parent in &stage.parents {
                if parent.index() >= stages.len() {
                    return Err(IngestError::invalid_graph(format!(
                        "stage '{}' depends on unknown stage {}",
                        stage.name,
                        parent.index()
                    )));
                }
                if *parent == stage.id {
                    return Err(IngestError::invalid_graph(format!(
                        "stage '{}' depends on itself",
                        stage.name
                    )));
                }
                edges.push(Edge {
                    parent: *parent,
                    child: stage.id,
                });
            }
        }

        check_artifacts(&registry, &stages)?;
        let order = topological_order(&stages)?;
        check_causality(&registry, &stages, &order)?;

        Ok(Self {
            name: name.into(),
            generated_at: Utc::now(),
            artifacts: registry.into_artifacts(),
            stages,
            edges,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id.index())
    }

    pub fn stage_by_name(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn artifact(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.get(id.index())
    }

    /// Stages in an order where every parent precedes its children
    pub fn topological_order(&self) -> &[StageId] {
        &self.order
    }

    pub fn parents_of(&self, id: StageId) -> Vec<StageId> {
        self.stage(id).map(|s| s.parents.clone()).unwrap_or_default()
    }

    pub fn children_of(&self, id: StageId) -> Vec<StageId> {
        self.edges
            .iter()
            .filter(|e| e.parent == id)
            .map(|e| e.child)
            .collect()
    }

    /// Stages belonging to input-file branches
    pub fn processing_stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(|s| !s.kind.is_lifecycle())
    }

    pub fn lifecycle_stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(|s| s.kind.is_lifecycle())
    }

    pub fn stages_of_kind(&self, kind: StageKind) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(move |s| s.kind == kind)
    }

    /// Stages of the branch for the given 1-based input index
    pub fn branch(&self, file_index: usize) -> Vec<&Stage> {
        self.stages
            .iter()
            .filter(|s| s.file_index == Some(file_index))
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.stages.iter().filter_map(|s| s.file_index).max().unwrap_or(0)
    }

    /// Scheduler-facing view with artifacts and parents resolved to names
    pub fn describe(&self) -> WorkflowDescription {
        let artifact_name = |id: ArtifactId| {
            self.artifact(id)
                .map(|a| a.name.clone())
                .unwrap_or_default()
        };
        let stage_name = |id: StageId| self.stage(id).map(|s| s.name.clone()).unwrap_or_default();

        let jobs = self
            .order
            .iter()
            .filter_map(|id| self.stage(*id))
            .map(|stage| JobDescription {
                name: stage.name.clone(),
                kind: stage.kind,
                program: stage.program.clone(),
                arguments: stage
                    .arguments
                    .iter()
                    .map(|arg| match arg {
                        Argument::Literal(value) => value.clone(),
                        Argument::Artifact(id) => artifact_name(*id),
                    })
                    .collect(),
                inputs: stage.inputs.iter().map(|id| artifact_name(*id)).collect(),
                outputs: stage.outputs.iter().map(|id| artifact_name(*id)).collect(),
                stdout: stage.stdout.map(artifact_name),
                log: artifact_name(stage.log),
                resources: stage.resources,
                memory_mib: stage.resources.memory_mib(),
                parents: stage.parents.iter().map(|id| stage_name(*id)).collect(),
            })
            .collect();

        WorkflowDescription {
            name: self.name.clone(),
            generated_at: self.generated_at,
            files: self.file_count(),
            artifacts: self.artifacts.clone(),
            jobs,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.describe())
            .map_err(|e| IngestError::configuration(format!("failed to render workflow as YAML: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.describe())?)
    }
}

/// Serialized workflow handed to the batch scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub files: usize,
    pub artifacts: Vec<Artifact>,
    /// Jobs in topological order
    pub jobs: Vec<JobDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub name: String,
    pub kind: StageKind,
    pub program: String,
    pub arguments: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    pub log: String,
    pub resources: ResourceClass,
    pub memory_mib: u64,
    pub parents: Vec<String>,
}

fn check_artifacts(registry: &ArtifactRegistry, stages: &[Stage]) -> Result<()> {
    for stage in stages {
        for id in stage.referenced_artifacts() {
            if !registry.contains(id) {
                return Err(IngestError::invalid_graph(format!(
                    "stage '{}' references undeclared artifact {}",
                    stage.name,
                    id.index()
                )));
            }
        }

        for id in stage.written_artifacts() {
            let produced_by = registry.get(id).and_then(|a| a.produced_by);
            if produced_by != Some(stage.id) {
                let name = registry.get(id).map(|a| a.name.as_str()).unwrap_or("?");
                return Err(IngestError::invalid_graph(format!(
                    "stage '{}' writes '{}' which is not declared as its output",
                    stage.name, name
                )));
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm; ties resolve by stage id so the order is deterministic
fn topological_order(stages: &[Stage]) -> Result<Vec<StageId>> {
    let mut in_degree: Vec<usize> = stages.iter().map(|s| s.parents.len()).collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    for stage in stages {
        for parent in &stage.parents {
            children[parent.index()].push(stage.id.index());
        }
    }

    let mut ready: VecDeque<usize> = (0..stages.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());

    while let Some(next) = ready.pop_front() {
        order.push(StageId(next));
        for child in &children[next] {
            in_degree[*child] -= 1;
            if in_degree[*child] == 0 {
                ready.push_back(*child);
            }
        }
    }

    if order.len() != stages.len() {
        let stuck: Vec<&str> = stages
            .iter()
            .filter(|s| in_degree[s.id.index()] > 0)
            .map(|s| s.name.as_str())
            .collect();
        return Err(IngestError::invalid_graph(format!(
            "dependency cycle through stages: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

fn check_causality(registry: &ArtifactRegistry, stages: &[Stage], order: &[StageId]) -> Result<()> {
    let mut ancestors: Vec<BTreeSet<StageId>> = vec![BTreeSet::new(); stages.len()];

    for id in order {
        let stage = &stages[id.index()];
        let mut own = BTreeSet::new();
        for parent in &stage.parents {
            own.insert(*parent);
            own.extend(ancestors[parent.index()].iter().copied());
        }

        for input in &stage.inputs {
            let Some(artifact) = registry.get(*input) else {
                continue;
            };
            if let Some(producer) = artifact.produced_by {
                if !own.contains(&producer) {
                    return Err(IngestError::invalid_graph(format!(
                        "stage '{}' consumes '{}' before its producer runs",
                        stage.name, artifact.name
                    )));
                }
            }
        }

        ancestors[id.index()] = own;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;

    fn stage(registry: &mut ArtifactRegistry, index: usize, parents: Vec<usize>) -> Stage {
        let id = StageId(index);
        let log = registry
            .declare_output(format!("stage-{}.log", index), ArtifactKind::GenericLog, id)
            .unwrap();
        Stage {
            id,
            name: format!("stage-{}", index),
            kind: StageKind::Clean,
            program: "true".into(),
            arguments: vec![],
            inputs: vec![],
            outputs: vec![],
            log,
            stdout: None,
            resources: ResourceClass::Small,
            parents: parents.into_iter().map(StageId).collect(),
            file_index: None,
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let mut registry = ArtifactRegistry::new();
        let stages = vec![
            stage(&mut registry, 0, vec![2]),
            stage(&mut registry, 1, vec![0]),
            stage(&mut registry, 2, vec![1]),
        ];
        let err = Workflow::freeze("cyclic", registry, stages).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut registry = ArtifactRegistry::new();
        let stages = vec![stage(&mut registry, 0, vec![0])];
        assert!(Workflow::freeze("self", registry, stages).is_err());
    }

    #[test]
    fn test_consuming_unordered_output_rejected() {
        let mut registry = ArtifactRegistry::new();
        let mut producer = stage(&mut registry, 0, vec![]);
        let mut consumer = stage(&mut registry, 1, vec![]);
        let file = registry
            .declare_output("csv-1.csv", ArtifactKind::ConvertedFile, StageId(0))
            .unwrap();
        producer.outputs.push(file);
        consumer.inputs.push(file);

        let err = Workflow::freeze("race", registry, vec![producer, consumer]).unwrap_err();
        assert!(err.to_string().contains("before its producer runs"));
    }

    #[test]
    fn test_undeclared_output_rejected() {
        let mut registry = ArtifactRegistry::new();
        let mut first = stage(&mut registry, 0, vec![]);
        let foreign = registry
            .declare_output("other.csv", ArtifactKind::CleanedFile, StageId(1))
            .unwrap();
        first.outputs.push(foreign);
        let second = stage(&mut registry, 1, vec![0]);

        assert!(Workflow::freeze("foreign", registry, vec![first, second]).is_err());
    }

    #[test]
    fn test_order_and_neighbours() {
        let mut registry = ArtifactRegistry::new();
        let stages = vec![
            stage(&mut registry, 0, vec![]),
            stage(&mut registry, 1, vec![0]),
            stage(&mut registry, 2, vec![0]),
            stage(&mut registry, 3, vec![1, 2]),
        ];
        let workflow = Workflow::freeze("diamond", registry, stages).unwrap();

        assert_eq!(
            workflow.topological_order(),
            &[StageId(0), StageId(1), StageId(2), StageId(3)]
        );
        assert_eq!(workflow.children_of(StageId(0)), vec![StageId(1), StageId(2)]);
        assert_eq!(workflow.parents_of(StageId(3)), vec![StageId(1), StageId(2)]);
        assert_eq!(workflow.edges().len(), 4);
    }
}
