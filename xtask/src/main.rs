//! Build automation tasks for qingest
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for qingest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<qingest_cli::Cli>();

    let content = format!(
        r#"# qingest CLI Reference

Generated from the CLI source code on {}.

## Overview

qingest coordinates bulk catalog ingest into a Qserv-style partitioned
database. It compiles input lists into scheduler workflows, and it drives the
database, table, super-transaction and chunk calls those workflows run.

## Quick Start

```bash
# Compile a workflow for the scheduler
qingest workflow compile -i inparq.list -o workflow.yaml

# Or ingest already-partitioned chunk directories directly
qingest ingest hsc_rc2 Object --columns columns.json --dir chunks/chunksSet1 --publish
```

## Commands

{}

## Environment Variables

- `QINGEST_SERVER_URL` - Ingest service URL (default: `http://localhost:25080`)
- `QINGEST_AUTH_PATH` - Auth file holding the credential (default: `~/.lsst/qserv`)
- `QINGEST_API_TIMEOUT_SECS` - Per-request timeout in seconds (default: `300`)
- `QINGEST_LOG_LEVEL`, `RUST_LOG` - Logging level (e.g., `debug`, `info`, `warn`)

## Exit Codes

| Code | Meaning |
|------|---------|
| 0 | Success |
| 1 | Fatal error (configuration, credential, lifecycle call) |
| 2 | Usage error |
| 3 | Some chunks failed; the rest were processed |

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
