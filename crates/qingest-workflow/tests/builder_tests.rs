//! Graph-shape tests for the workflow builder

#![allow(clippy::unwrap_used, clippy::expect_used)]

use qingest_common::IngestError;
use qingest_workflow::{
    read_input_list, ArtifactKind, LoadMode, ResourceClass, StageId, StageKind, Workflow,
    WorkflowBuilder, WorkflowDescription, WorkflowSettings,
};
use std::collections::HashMap;
use std::io::Write;
use tempfile::TempDir;

fn inputs(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("/datasets/hsc/rc2/object-{}.parq", i))
        .collect()
}

/// Settings for synthetic input paths that do not exist on this host
fn unverified() -> WorkflowSettings {
    WorkflowSettings {
        verify_inputs: false,
        ..WorkflowSettings::default()
    }
}

fn build(settings: WorkflowSettings, count: usize) -> Workflow {
    WorkflowBuilder::new(settings).build(&inputs(count)).unwrap()
}

fn position(workflow: &Workflow) -> HashMap<StageId, usize> {
    workflow
        .topological_order()
        .iter()
        .enumerate()
        .map(|(pos, id)| (*id, pos))
        .collect()
}

#[test]
fn test_inline_stage_counts() {
    let workflow = build(unverified(), 3);

    assert_eq!(workflow.processing_stages().count(), 15);
    assert_eq!(workflow.lifecycle_stages().count(), 4);
    assert_eq!(workflow.stages_of_kind(StageKind::AllocateAndLoad).count(), 3);
    assert_eq!(workflow.file_count(), 3);
}

#[test]
fn test_deferred_load_adds_stage_per_file() {
    let settings = WorkflowSettings {
        load_mode: LoadMode::Deferred,
        ..unverified()
    };
    let workflow = build(settings, 2);

    assert_eq!(workflow.processing_stages().count(), 12);
    assert_eq!(workflow.stages_of_kind(StageKind::AllocateAndLoad).count(), 0);

    let load = workflow.stage_by_name("load-2").unwrap();
    let allocate = workflow.stage_by_name("allocate-chunks-2").unwrap();
    assert_eq!(load.parents, vec![allocate.id]);

    let manifest = workflow.artifact(load.inputs[0]).unwrap();
    assert_eq!(manifest.kind, ArtifactKind::LoadManifest);
    assert_eq!(manifest.produced_by, Some(allocate.id));
}

#[test]
fn test_without_commit_stage() {
    let settings = WorkflowSettings {
        commit: false,
        ..unverified()
    };
    let workflow = build(settings, 2);

    assert_eq!(workflow.lifecycle_stages().count(), 3);
    assert_eq!(workflow.stages_of_kind(StageKind::CommitTransaction).count(), 0);
}

#[test]
fn test_order_respects_every_edge() {
    let workflow = build(unverified(), 4);
    let position = position(&workflow);

    assert_eq!(position.len(), workflow.stages().len());
    for edge in workflow.edges() {
        assert!(
            position[&edge.parent] < position[&edge.child],
            "{:?} must precede {:?}",
            edge.parent,
            edge.child
        );
    }
}

#[test]
fn test_branch_chain() {
    let workflow = build(unverified(), 2);
    let branch = workflow.branch(2);
    let kinds: Vec<StageKind> = branch.iter().map(|s| s.kind).collect();

    assert_eq!(
        kinds,
        vec![
            StageKind::NormalizeTypes,
            StageKind::ConvertFormat,
            StageKind::Clean,
            StageKind::Partition,
            StageKind::AllocateAndLoad,
        ]
    );

    for pair in branch.windows(2) {
        assert!(pair[1].parents.contains(&pair[0].id));
    }

    let start = workflow.stage_by_name("start-transaction").unwrap();
    assert!(branch[4].parents.contains(&start.id));
    assert!(branch[0].parents.is_empty());
}

#[test]
fn test_branches_are_independent() {
    let workflow = build(unverified(), 3);

    for stage in workflow.processing_stages() {
        let index = stage.file_index.unwrap();
        for parent in &stage.parents {
            let parent = workflow.stage(*parent).unwrap();
            if let Some(other) = parent.file_index {
                assert_eq!(other, index, "{} depends on {}", stage.name, parent.name);
            } else {
                assert!(parent.kind.is_lifecycle());
            }
        }
    }
}

#[test]
fn test_commit_waits_for_every_branch() {
    let workflow = build(unverified(), 3);
    let commit = workflow.stage_by_name("commit-transaction").unwrap();

    for i in 1..=3 {
        let last = workflow.stage_by_name(&format!("allocate-and-load-{}", i)).unwrap();
        assert!(commit.parents.contains(&last.id));
    }
    assert_eq!(
        workflow.topological_order().last().copied(),
        Some(commit.id)
    );
}

#[test]
fn test_transaction_log_consumers() {
    let workflow = build(unverified(), 2);
    let start = workflow.stage_by_name("start-transaction").unwrap();
    let log = workflow.artifact(start.log).unwrap();

    assert_eq!(log.kind, ArtifactKind::TransactionLog);
    assert_eq!(log.name, "start-transaction.log");

    let consumers: Vec<&str> = workflow
        .stages()
        .iter()
        .filter(|s| s.inputs.contains(&start.log))
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(
        consumers,
        vec!["allocate-and-load-1", "allocate-and-load-2", "commit-transaction"]
    );
}

#[test]
fn test_every_stage_has_its_own_log() {
    let workflow = build(unverified(), 2);

    for stage in workflow.stages() {
        let log = workflow.artifact(stage.log).unwrap();
        assert!(log.kind.is_log());
        assert_eq!(log.produced_by, Some(stage.id));
        assert_eq!(log.name, format!("{}.log", stage.name));
    }
}

#[test]
fn test_resource_classes() {
    let workflow = build(unverified(), 1);

    let class = |name: &str| workflow.stage_by_name(name).unwrap().resources;
    assert_eq!(class("normalize-types-1"), ResourceClass::Large);
    assert_eq!(class("convert-format-1"), ResourceClass::Medium);
    assert_eq!(class("partition-1"), ResourceClass::Large);
    assert_eq!(class("create-database"), ResourceClass::Small);
}

#[test]
fn test_empty_input_rejected() {
    let empty: Vec<String> = Vec::new();
    let err = WorkflowBuilder::new(unverified())
        .build(&empty)
        .unwrap_err();
    assert!(matches!(err, IngestError::Configuration(_)));
}

#[test]
fn test_description_names() {
    let workflow = build(unverified(), 1);
    let yaml = workflow.to_yaml().unwrap();
    let description: WorkflowDescription = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(description.files, 1);
    assert_eq!(description.jobs.len(), workflow.stages().len());
    assert_eq!(description.jobs[0].name, "create-database");

    let clean = description.jobs.iter().find(|j| j.name == "clean-1").unwrap();
    assert_eq!(clean.program, "sed");
    assert_eq!(clean.arguments, vec!["-f", "fixCsv.sed", "csv-1.csv"]);
    assert_eq!(clean.stdout.as_deref(), Some("new-1.csv"));

    let partition = description.jobs.iter().find(|j| j.name == "partition-1").unwrap();
    assert!(partition.arguments.contains(&"chunks/chunksSet1".to_string()));
    assert_eq!(partition.parents, vec!["clean-1"]);
}

#[test]
fn test_compile_from_list_file() {
    let mut list = tempfile::NamedTempFile::new().unwrap();
    writeln!(list, "/datasets/a.parq").unwrap();
    writeln!(list, "/datasets/b.parq").unwrap();

    let inputs = read_input_list(list.path()).unwrap();
    let workflow = WorkflowBuilder::new(unverified())
        .build(&inputs)
        .unwrap();

    let source = workflow
        .artifacts()
        .iter()
        .find(|a| a.name == "/datasets/b.parq")
        .unwrap();
    assert_eq!(source.kind, ArtifactKind::InputCatalogFile);
    assert!(source.produced_by.is_none());
}

#[test]
fn test_default_settings_reject_missing_input() {
    let err = WorkflowBuilder::new(WorkflowSettings::default())
        .build(&["/nonexistent/hsc/object-1.parq"])
        .unwrap_err();

    assert!(matches!(err, IngestError::Configuration(_)));
    assert!(err.to_string().contains("/nonexistent/hsc/object-1.parq"));
}

#[test]
fn test_default_settings_reject_one_missing_among_readable() {
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("object-1.parq");
    std::fs::write(&present, b"PAR1").unwrap();
    let missing = dir.path().join("object-2.parq");

    let result = WorkflowBuilder::new(WorkflowSettings::default()).build(&[present, missing]);
    assert!(matches!(result, Err(IngestError::Configuration(_))));
}

#[test]
fn test_default_settings_accept_readable_inputs() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<_> = (1..=2)
        .map(|i| {
            let path = dir.path().join(format!("object-{}.parq", i));
            std::fs::write(&path, b"PAR1").unwrap();
            path
        })
        .collect();

    let workflow = WorkflowBuilder::new(WorkflowSettings::default())
        .build(&inputs)
        .unwrap();
    assert_eq!(workflow.file_count(), 2);
    assert_eq!(workflow.processing_stages().count(), 10);
}
