//! Workflow compilation command

use crate::config::Config;
use crate::error::Result;
use crate::OutputFormat;
use colored::Colorize;
use qingest_workflow::{read_input_list, LoadMode, WorkflowBuilder, WorkflowSettings};
use std::path::{Path, PathBuf};
use tracing::info;

/// Flags of `workflow compile`
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub deferred_load: bool,
    pub no_commit: bool,
    pub database: Option<String>,
    pub table: Option<String>,
    pub no_verify_inputs: bool,
}

impl CompileOptions {
    /// Configured workflow settings with command-line overrides applied
    fn settings(&self, base: &WorkflowSettings) -> WorkflowSettings {
        let mut settings = base.clone();
        if self.deferred_load {
            settings.load_mode = LoadMode::Deferred;
        }
        if self.no_commit {
            settings.commit = false;
        }
        if let Some(database) = &self.database {
            settings.database = database.clone();
        }
        if let Some(table) = &self.table {
            settings.table = table.clone();
        }
        if self.no_verify_inputs {
            settings.verify_inputs = false;
        }
        settings
    }
}

pub async fn compile(config: &Config, options: CompileOptions) -> Result<()> {
    let settings = options.settings(&config.workflow);
    let inputs = read_input_list(&options.input)?;

    let workflow = WorkflowBuilder::new(settings).build(&inputs)?;
    let rendered = match options.format {
        OutputFormat::Yaml => workflow.to_yaml()?,
        OutputFormat::Json => workflow.to_json()?,
    };
    write_output(&options.output, &rendered)?;

    info!(
        output = %options.output.display(),
        stages = workflow.stages().len(),
        "Wrote workflow description"
    );
    println!(
        "{} Compiled {} input file(s) into {} stages: {}",
        "✓".green().bold(),
        workflow.file_count(),
        workflow.stages().len(),
        options.output.display().to_string().cyan()
    );

    Ok(())
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir, format: OutputFormat) -> CompileOptions {
        CompileOptions {
            input: dir.path().join("inparq.list"),
            output: dir.path().join("out").join("workflow"),
            format,
            deferred_load: false,
            no_commit: false,
            database: None,
            table: None,
            no_verify_inputs: true,
        }
    }

    #[test]
    fn test_overrides() {
        let dir = TempDir::new().unwrap();
        let mut options = options(&dir, OutputFormat::Yaml);
        options.deferred_load = true;
        options.no_commit = true;
        options.table = Some("Source".into());

        let settings = options.settings(&WorkflowSettings::default());
        assert_eq!(settings.load_mode, LoadMode::Deferred);
        assert!(!settings.commit);
        assert_eq!(settings.table, "Source");
        assert_eq!(settings.database, "hsc_rc2_w_2020_14_00");
        assert!(!settings.verify_inputs);
    }

    #[tokio::test]
    async fn test_missing_input_fails_by_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("inparq.list"), "/nonexistent/a.parq\n").unwrap();

        let mut options = options(&dir, OutputFormat::Yaml);
        options.no_verify_inputs = false;
        let output = options.output.clone();

        let err = compile(&Config::default(), options).await.unwrap_err();
        assert!(err.to_string().contains("unreadable"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_compile_writes_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("inparq.list"), "/d/a.parq\n/d/b.parq\n").unwrap();

        let options = options(&dir, OutputFormat::Json);
        let output = options.output.clone();
        compile(&Config::default(), options).await.unwrap();

        let description: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(description["files"], 2);
        assert_eq!(description["jobs"].as_array().unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_empty_list_writes_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("inparq.list"), "\n").unwrap();

        let options = options(&dir, OutputFormat::Yaml);
        let output = options.output.clone();
        assert!(compile(&Config::default(), options).await.is_err());
        assert!(!output.exists());
    }
}
