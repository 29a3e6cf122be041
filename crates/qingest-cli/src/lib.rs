//! qingest CLI Library
//!
//! Drives bulk catalog ingest into a Qserv-style partitioned database.
//!
//! # Overview
//!
//! - **Workflow compilation**: turn an input list into a stage graph for a batch scheduler (`qingest workflow compile`)
//! - **Database lifecycle**: create and publish databases, register tables (`qingest database`, `qingest table`)
//! - **Super-transactions**: start, commit and abort (`qingest transaction`)
//! - **Chunk protocol**: allocate chunks on workers and load them (`qingest chunks allocate/load`)
//! - **One-shot ingest**: all of the above for already-partitioned directories (`qingest ingest`)

pub mod api;
pub mod chunks;
pub mod commands;
pub mod config;
pub mod credential;
pub mod error;
pub mod progress;
pub mod transaction;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, Result};

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// qingest - bulk catalog ingest coordinator
#[derive(Parser, Debug)]
#[command(name = "qingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ingest service URL (overrides the config file)
    #[arg(long, env = "QINGEST_SERVER_URL", global = true)]
    pub server_url: Option<String>,

    /// Configuration file (defaults to ./qingest.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the command reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the ingest service API version
    Version,

    /// Compile scheduler workflows
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },

    /// Create and publish databases
    Database {
        #[command(subcommand)]
        command: DatabaseCommand,
    },

    /// Register tables
    Table {
        #[command(subcommand)]
        command: TableCommand,
    },

    /// Manage super-transactions
    Transaction {
        #[command(subcommand)]
        command: TransactionCommand,
    },

    /// Allocate and load chunks
    Chunks {
        #[command(subcommand)]
        command: ChunksCommand,
    },

    /// Ingest partitioned chunk directories in one transaction
    Ingest(IngestArgs),
}

/// Workflow description format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Workflow subcommands
#[derive(Subcommand, Debug)]
pub enum WorkflowCommand {
    /// Compile an input list into a workflow description
    Compile {
        /// File listing one input catalog file per line
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the workflow description
        #[arg(short, long)]
        output: PathBuf,

        /// Description format
        #[arg(long, value_enum, default_value = "yaml")]
        format: OutputFormat,

        /// Split chunk allocation and loading into separate stages
        #[arg(long)]
        deferred_load: bool,

        /// Leave the transaction open at the end of the workflow
        #[arg(long)]
        no_commit: bool,

        /// Target database (overrides the config file)
        #[arg(long)]
        database: Option<String>,

        /// Target table (overrides the config file)
        #[arg(long)]
        table: Option<String>,

        /// Skip opening each listed input (inputs only exist on the batch cluster)
        #[arg(long)]
        no_verify_inputs: bool,
    },
}

/// Database subcommands
#[derive(Subcommand, Debug)]
pub enum DatabaseCommand {
    /// Create a partitioned database
    Create {
        /// Database name
        database: String,

        /// Number of stripes (defaults to the configured partitioning)
        #[arg(long)]
        stripes: Option<u32>,

        /// Number of sub-stripes per stripe
        #[arg(long)]
        sub_stripes: Option<u32>,

        /// Chunk/sub-chunk overlap radius in degrees
        #[arg(long)]
        overlap: Option<f64>,
    },

    /// Publish a database once its transactions are committed
    Publish {
        /// Database name
        database: String,

        /// Consolidate the secondary index while publishing
        #[arg(long)]
        consolidate_secondary_index: bool,
    },
}

/// Table subcommands
#[derive(Subcommand, Debug)]
pub enum TableCommand {
    /// Register a table
    Create {
        /// Database name
        database: String,

        /// Table name
        table: String,

        /// JSON list of {"name", "type"} column definitions
        #[arg(long)]
        columns: PathBuf,

        /// JSON object of extra table parameters
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

/// Transaction subcommands
#[derive(Subcommand, Debug)]
pub enum TransactionCommand {
    /// Start a super-transaction and print "Started transaction <id>"
    Start {
        /// Database name
        database: String,
    },

    /// Commit a super-transaction
    #[command(group(ArgGroup::new("id_source").required(true).args(["id", "id_file"])))]
    Commit {
        /// Transaction id
        id: Option<u64>,

        /// Log containing a "Started transaction <id>" line
        #[arg(long)]
        id_file: Option<PathBuf>,

        /// Build the secondary index while committing
        #[arg(long)]
        build_secondary_index: bool,
    },

    /// Abort a super-transaction
    #[command(group(ArgGroup::new("id_source").required(true).args(["id", "id_file"])))]
    Abort {
        /// Transaction id
        id: Option<u64>,

        /// Log containing a "Started transaction <id>" line
        #[arg(long)]
        id_file: Option<PathBuf>,
    },
}

/// Chunk subcommands
#[derive(Subcommand, Debug)]
pub enum ChunksCommand {
    /// Allocate every chunk file of a partition output directory
    #[command(group(ArgGroup::new("id_source").required(true).args(["id", "id_file"])))]
    Allocate {
        /// Directory of chunk_<id> files
        dir: PathBuf,

        /// Transaction id
        #[arg(long)]
        id: Option<u64>,

        /// Log containing a "Started transaction <id>" line
        #[arg(long)]
        id_file: Option<PathBuf>,

        /// Table the chunks belong to (defaults to the configured table)
        #[arg(long)]
        table: Option<String>,

        /// Write load directives here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Load each chunk right after allocating it
        #[arg(long)]
        load: bool,
    },

    /// Load the chunks listed in a directive manifest
    Load {
        /// Manifest written by `chunks allocate`
        manifest: PathBuf,
    },
}

/// Arguments for `qingest ingest`
#[derive(clap::Args, Debug)]
pub struct IngestArgs {
    /// Database name
    pub database: String,

    /// Table name
    pub table: String,

    /// JSON list of {"name", "type"} column definitions
    #[arg(long, required_unless_present = "existing")]
    pub columns: Option<PathBuf>,

    /// JSON object of extra table parameters
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Partition output directories
    #[arg(long = "dir", required = true, num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    /// Number of stripes (defaults to the configured partitioning)
    #[arg(long)]
    pub stripes: Option<u32>,

    /// Number of sub-stripes per stripe
    #[arg(long)]
    pub sub_stripes: Option<u32>,

    /// Chunk/sub-chunk overlap radius in degrees
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Database and table already exist; skip creating them
    #[arg(long)]
    pub existing: bool,

    /// Build the secondary index while committing
    #[arg(long)]
    pub build_secondary_index: bool,

    /// Publish the database after a successful commit
    #[arg(long)]
    pub publish: bool,

    /// Consolidate the secondary index while publishing
    #[arg(long, requires = "publish")]
    pub consolidate_secondary_index: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_commit_needs_an_id_source() {
        assert!(Cli::try_parse_from(["qingest", "transaction", "commit"]).is_err());
        assert!(Cli::try_parse_from(["qingest", "transaction", "commit", "7", "--id-file", "x.log"]).is_err());

        let cli = Cli::try_parse_from(["qingest", "transaction", "commit", "--id-file", "start.log"]).unwrap();
        match cli.command {
            Some(Commands::Transaction {
                command: TransactionCommand::Commit { id, id_file, .. },
            }) => {
                assert!(id.is_none());
                assert_eq!(id_file, Some(PathBuf::from("start.log")));
            },
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_columns_optional_with_existing() {
        assert!(Cli::try_parse_from(["qingest", "ingest", "db1", "Object", "--dir", "c1"]).is_err());
        let cli = Cli::try_parse_from([
            "qingest", "ingest", "db1", "Object", "--existing", "--dir", "c1", "c2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ingest(args)) => assert_eq!(args.dirs.len(), 2),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_index_flags_are_independent() {
        let cli = Cli::try_parse_from([
            "qingest", "ingest", "db1", "Object", "--existing", "--dir", "c1",
            "--build-secondary-index", "--publish",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ingest(args)) => {
                assert!(args.build_secondary_index);
                assert!(args.publish);
                assert!(!args.consolidate_secondary_index);
            },
            other => panic!("unexpected parse: {:?}", other),
        }

        assert!(Cli::try_parse_from([
            "qingest", "ingest", "db1", "Object", "--existing", "--dir", "c1",
            "--consolidate-secondary-index",
        ])
        .is_err());
    }
}
