//! Stage graph builder
//!
//! Turns an input list into a frozen [`Workflow`]. All input validation runs
//! before the first stage is emitted, so a bad list never yields a partial
//! graph.

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactRegistry};
use crate::graph::Workflow;
use crate::settings::{LoadMode, WorkflowSettings};
use crate::stage::{Argument, Stage, StageId, StageKind};
use qingest_common::{IngestError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read an input list: one catalog file path per line.
///
/// Blank lines and `#` comments are skipped. A missing or empty list is a
/// configuration error.
pub fn read_input_list(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        IngestError::configuration(format!("cannot read input list '{}': {}", path.display(), e))
    })?;

    let inputs: Vec<PathBuf> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect();

    if inputs.is_empty() {
        return Err(IngestError::configuration(format!(
            "input list '{}' names no files",
            path.display()
        )));
    }

    Ok(inputs)
}

/// Config files shared by every branch
struct SharedInputs {
    schema_descriptor: ArtifactId,
    fix_script: ArtifactId,
    partition_config: ArtifactId,
    table_columns: ArtifactId,
    table_params: ArtifactId,
}

struct Lifecycle {
    start_transaction: StageId,
    transaction_log: ArtifactId,
}

/// A stage being assembled; its id is reserved but it is not yet in the graph
struct StageDraft {
    id: StageId,
    name: String,
    kind: StageKind,
    program: String,
    arguments: Vec<Argument>,
    inputs: Vec<ArtifactId>,
    outputs: Vec<ArtifactId>,
    stdout: Option<ArtifactId>,
    parents: Vec<StageId>,
    file_index: Option<usize>,
}

impl StageDraft {
    fn arg(mut self, value: impl ToString) -> Self {
        self.arguments.push(Argument::literal(value));
        self
    }

    /// Pass an artifact on the command line and declare it as an input
    fn consumes(mut self, id: ArtifactId) -> Self {
        self.arguments.push(Argument::Artifact(id));
        self.inputs.push(id);
        self
    }

    /// Pass an artifact on the command line and declare it as an output
    fn produces(mut self, id: ArtifactId) -> Self {
        self.arguments.push(Argument::Artifact(id));
        self.outputs.push(id);
        self
    }

    /// Redirect stdout into a declared output
    fn stdout_to(mut self, id: ArtifactId) -> Self {
        self.outputs.push(id);
        self.stdout = Some(id);
        self
    }

    fn after(mut self, parent: StageId) -> Self {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }
}

pub struct WorkflowBuilder {
    settings: WorkflowSettings,
    registry: ArtifactRegistry,
    stages: Vec<Stage>,
}

impl WorkflowBuilder {
    pub fn new(settings: WorkflowSettings) -> Self {
        Self {
            settings,
            registry: ArtifactRegistry::new(),
            stages: Vec::new(),
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Compile the graph for `inputs`, one branch per file in list order
    pub fn build<P: AsRef<Path>>(mut self, inputs: &[P]) -> Result<Workflow> {
        let inputs = self.validate_inputs(inputs)?;

        let shared = self.declare_shared_inputs()?;
        let lifecycle = self.add_lifecycle(&shared)?;

        let mut branch_ends = Vec::with_capacity(inputs.len());
        for (offset, input) in inputs.iter().enumerate() {
            let index = offset + 1;
            debug!(index, input = %input, "Adding input file");
            branch_ends.push(self.add_branch(index, input, &shared, &lifecycle)?);
        }

        if self.settings.commit {
            self.add_commit(&lifecycle, &branch_ends)?;
        }

        info!(
            files = inputs.len(),
            stages = self.stages.len(),
            artifacts = self.registry.len(),
            load_mode = ?self.settings.load_mode,
            "Compiled workflow"
        );

        Workflow::freeze(self.settings.name.clone(), self.registry, self.stages)
    }

    fn validate_inputs<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<String>> {
        if inputs.is_empty() {
            return Err(IngestError::configuration("no input files given"));
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(inputs.len());

        for (offset, input) in inputs.iter().enumerate() {
            let path = input.as_ref();
            let display = path.to_string_lossy().trim().to_string();

            if display.is_empty() {
                return Err(IngestError::configuration(format!(
                    "input #{} has an empty path",
                    offset + 1
                )));
            }
            if !seen.insert(display.clone()) {
                return Err(IngestError::configuration(format!(
                    "input '{}' is listed more than once",
                    display
                )));
            }
            if self.settings.verify_inputs {
                std::fs::File::open(path).map_err(|e| {
                    IngestError::configuration(format!("input '{}' is unreadable: {}", display, e))
                })?;
            }

            validated.push(display);
        }

        Ok(validated)
    }

    fn declare_shared_inputs(&mut self) -> Result<SharedInputs> {
        let s = &self.settings;
        let (schema, script, partition, columns, params) = (
            s.schema_descriptor.clone(),
            s.fix_script.clone(),
            s.partition_config.clone(),
            s.table_columns.clone(),
            s.table_params.clone(),
        );

        Ok(SharedInputs {
            schema_descriptor: self.registry.declare_input(schema, ArtifactKind::ConfigFile)?,
            fix_script: self.registry.declare_input(script, ArtifactKind::ConfigFile)?,
            partition_config: self.registry.declare_input(partition, ArtifactKind::ConfigFile)?,
            table_columns: self.registry.declare_input(columns, ArtifactKind::ConfigFile)?,
            table_params: self.registry.declare_input(params, ArtifactKind::ConfigFile)?,
        })
    }

    fn add_lifecycle(&mut self, shared: &SharedInputs) -> Result<Lifecycle> {
        let database = self.settings.database.clone();
        let table = self.settings.table.clone();
        let partitioning = self.settings.partitioning.clone();

        let draft = self
            .begin(StageKind::CreateDatabase, None)
            .arg("database")
            .arg("create")
            .arg(&database)
            .arg("--stripes")
            .arg(partitioning.num_stripes)
            .arg("--sub-stripes")
            .arg(partitioning.num_sub_stripes)
            .arg("--overlap")
            .arg(partitioning.overlap);
        let create_database = self.finish(draft)?;

        let draft = self
            .begin(StageKind::CreateTable, None)
            .arg("table")
            .arg("create")
            .arg(&database)
            .arg(&table)
            .arg("--columns")
            .consumes(shared.table_columns)
            .arg("--params")
            .consumes(shared.table_params)
            .after(create_database);
        let create_table = self.finish(draft)?;

        let draft = self
            .begin(StageKind::StartTransaction, None)
            .arg("transaction")
            .arg("start")
            .arg(&database)
            .after(create_table);
        let start_transaction = self.finish(draft)?;

        let transaction_log = self.stages[start_transaction.index()].log;

        Ok(Lifecycle {
            start_transaction,
            transaction_log,
        })
    }

    /// Add one file's processing branch and return its final stage
    fn add_branch(
        &mut self,
        index: usize,
        input: &str,
        shared: &SharedInputs,
        lifecycle: &Lifecycle,
    ) -> Result<StageId> {
        let source = self
            .registry
            .declare_input(input, ArtifactKind::InputCatalogFile)?;

        let draft = self.begin(StageKind::NormalizeTypes, Some(index));
        let fixed = self.registry.declare_output(
            format!("hack-{}.parq", index),
            ArtifactKind::HackedFile,
            draft.id,
        )?;
        let draft = draft.arg("-i").consumes(source).arg("-o").produces(fixed);
        let normalize = self.finish(draft)?;

        let draft = self.begin(StageKind::ConvertFormat, Some(index));
        let converted = self.registry.declare_output(
            format!("csv-{}.csv", index),
            ArtifactKind::ConvertedFile,
            draft.id,
        )?;
        let draft = draft
            .arg("--schema")
            .consumes(shared.schema_descriptor)
            .arg("--verbose")
            .consumes(fixed)
            .produces(converted)
            .after(normalize);
        let convert = self.finish(draft)?;

        let draft = self.begin(StageKind::Clean, Some(index));
        let cleaned = self.registry.declare_output(
            format!("new-{}.csv", index),
            ArtifactKind::CleanedFile,
            draft.id,
        )?;
        let draft = draft
            .arg("-f")
            .consumes(shared.fix_script)
            .consumes(converted)
            .stdout_to(cleaned)
            .after(convert);
        let clean = self.finish(draft)?;

        let draft = self.begin(StageKind::Partition, Some(index));
        let chunk_dir = self
            .settings
            .chunk_base_dir
            .join(format!("chunksSet{}", index))
            .to_string_lossy()
            .into_owned();
        let chunk_dir = self
            .registry
            .declare_output(chunk_dir, ArtifactKind::ChunkDirectory, draft.id)?;
        let draft = draft
            .arg("--verbose")
            .arg("-c")
            .consumes(shared.partition_config)
            .arg("--in")
            .consumes(cleaned)
            .arg("--out.dir")
            .produces(chunk_dir)
            .after(clean);
        let partition = self.finish(draft)?;

        match self.settings.load_mode {
            LoadMode::Inline => {
                let draft = self.begin(StageKind::AllocateAndLoad, Some(index));
                let manifest = self.registry.declare_output(
                    format!("loaded-{}.txt", index),
                    ArtifactKind::LoadManifest,
                    draft.id,
                )?;
                let draft = self
                    .allocate_args(draft, chunk_dir, lifecycle.transaction_log, manifest)
                    .arg("--load")
                    .after(partition)
                    .after(lifecycle.start_transaction);
                self.finish(draft)
            },
            LoadMode::Deferred => {
                let draft = self.begin(StageKind::AllocateChunks, Some(index));
                let manifest = self.registry.declare_output(
                    format!("load-{}.txt", index),
                    ArtifactKind::LoadManifest,
                    draft.id,
                )?;
                let draft = self
                    .allocate_args(draft, chunk_dir, lifecycle.transaction_log, manifest)
                    .after(partition)
                    .after(lifecycle.start_transaction);
                let allocate = self.finish(draft)?;

                let draft = self
                    .begin(StageKind::Load, Some(index))
                    .arg("chunks")
                    .arg("load")
                    .consumes(manifest)
                    .after(allocate);
                self.finish(draft)
            },
        }
    }

    fn allocate_args(
        &self,
        draft: StageDraft,
        chunk_dir: ArtifactId,
        transaction_log: ArtifactId,
        manifest: ArtifactId,
    ) -> StageDraft {
        draft
            .arg("chunks")
            .arg("allocate")
            .consumes(chunk_dir)
            .arg("--id-file")
            .consumes(transaction_log)
            .arg("--table")
            .arg(&self.settings.table)
            .arg("--output")
            .produces(manifest)
    }

    fn add_commit(&mut self, lifecycle: &Lifecycle, branch_ends: &[StageId]) -> Result<StageId> {
        let mut draft = self
            .begin(StageKind::CommitTransaction, None)
            .arg("transaction")
            .arg("commit")
            .arg("--id-file")
            .consumes(lifecycle.transaction_log);
        if self.settings.build_secondary_index {
            draft = draft.arg("--build-secondary-index");
        }
        for end in branch_ends {
            draft = draft.after(*end);
        }
        self.finish(draft)
    }

    fn begin(&self, kind: StageKind, file_index: Option<usize>) -> StageDraft {
        let name = match file_index {
            Some(index) => format!("{}-{}", kind.label(), index),
            None => kind.label().to_string(),
        };
        let programs = &self.settings.programs;
        let program = match kind {
            StageKind::NormalizeTypes => programs.normalize_types.clone(),
            StageKind::ConvertFormat => programs.convert_format.clone(),
            StageKind::Clean => programs.clean.clone(),
            StageKind::Partition => programs.partition.clone(),
            _ => programs.ingest.clone(),
        };

        StageDraft {
            id: StageId(self.stages.len()),
            name,
            kind,
            program,
            arguments: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            stdout: None,
            parents: Vec::new(),
            file_index,
        }
    }

    fn finish(&mut self, draft: StageDraft) -> Result<StageId> {
        if draft.id.index() != self.stages.len() {
            return Err(IngestError::invalid_graph(format!(
                "stage '{}' finished out of order",
                draft.name
            )));
        }

        let log_kind = if draft.kind == StageKind::StartTransaction {
            ArtifactKind::TransactionLog
        } else {
            ArtifactKind::GenericLog
        };
        let log = self
            .registry
            .declare_output(format!("{}.log", draft.name), log_kind, draft.id)?;

        self.stages.push(Stage {
            id: draft.id,
            name: draft.name,
            kind: draft.kind,
            program: draft.program,
            arguments: draft.arguments,
            inputs: draft.inputs,
            outputs: draft.outputs,
            log,
            stdout: draft.stdout,
            resources: self.settings.resources.class_for(draft.kind),
            parents: draft.parents,
            file_index: draft.file_index,
        });

        Ok(draft.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn unverified() -> WorkflowSettings {
        WorkflowSettings {
            verify_inputs: false,
            ..WorkflowSettings::default()
        }
    }

    #[test]
    fn test_read_input_list_skips_blank_and_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# tract 9813").unwrap();
        writeln!(file, "/data/object-1.parq").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  /data/object-2.parq  ").unwrap();

        let inputs = read_input_list(file.path()).unwrap();
        assert_eq!(
            inputs,
            vec![PathBuf::from("/data/object-1.parq"), PathBuf::from("/data/object-2.parq")]
        );
    }

    #[test]
    fn test_read_input_list_missing_file() {
        let err = read_input_list("/nonexistent/inparq.list").unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[test]
    fn test_read_input_list_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            read_input_list(file.path()).unwrap_err(),
            IngestError::Configuration(_)
        ));
    }

    #[test]
    fn test_empty_path_fails_before_any_stage() {
        let builder = WorkflowBuilder::new(WorkflowSettings::default());
        let err = builder.build(&["/data/a.parq", ""]).unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let builder = WorkflowBuilder::new(unverified());
        let err = builder.build(&["/data/a.parq", "/data/a.parq"]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unreadable_input_rejected_by_default() {
        let err = WorkflowBuilder::new(WorkflowSettings::default())
            .build(&["/nonexistent/object.parq"])
            .unwrap_err();
        assert!(err.to_string().contains("unreadable"));
    }

    #[test]
    fn test_unverified_inputs_skip_open() {
        let workflow = WorkflowBuilder::new(unverified())
            .build(&["/nonexistent/object.parq"])
            .unwrap();
        assert_eq!(workflow.file_count(), 1);
    }

    #[test]
    fn test_stage_programs_and_resources() {
        let workflow = WorkflowBuilder::new(unverified())
            .build(&["/data/a.parq"])
            .unwrap();

        let partition = workflow.stage_by_name("partition-1").unwrap();
        assert_eq!(partition.program, "sph-partition");
        assert_eq!(partition.resources, crate::ResourceClass::Large);

        let allocate = workflow.stage_by_name("allocate-and-load-1").unwrap();
        assert_eq!(allocate.program, "qingest");
        assert!(allocate
            .arguments
            .contains(&Argument::Literal("--load".to_string())));
    }
}
