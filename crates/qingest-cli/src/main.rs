//! qingest - Main entry point

use clap::Parser;
use colored::Colorize;
use qingest_cli::commands::{self, chunks::AllocateOptions, workflow::CompileOptions};
use qingest_cli::{
    ChunksCommand, Cli, Commands, Config, DatabaseCommand, TableCommand, TransactionCommand, WorkflowCommand,
};
use qingest_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // Verbose mode logs debug to the console; otherwise warnings only
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("qingest")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok().flatten();

    let result = async {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(url) = cli.server_url {
            config.set_server_url(url);
        }
        config.validate()?;
        execute_command(command, &config).await
    }
    .await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(e.exit_code());
    }
}

async fn execute_command(command: Commands, config: &Config) -> qingest_cli::Result<()> {
    match command {
        Commands::Version => commands::version::run(config).await,

        Commands::Workflow { command } => match command {
            WorkflowCommand::Compile {
                input,
                output,
                format,
                deferred_load,
                no_commit,
                database,
                table,
                no_verify_inputs,
            } => {
                let options = CompileOptions {
                    input,
                    output,
                    format,
                    deferred_load,
                    no_commit,
                    database,
                    table,
                    no_verify_inputs,
                };
                commands::workflow::compile(config, options).await
            },
        },

        Commands::Database { command } => {
            let service = commands::connect(config)?;
            match command {
                DatabaseCommand::Create {
                    database,
                    stripes,
                    sub_stripes,
                    overlap,
                } => commands::database::create(service, config, database, stripes, sub_stripes, overlap).await,
                DatabaseCommand::Publish {
                    database,
                    consolidate_secondary_index,
                } => commands::database::publish(service, database, consolidate_secondary_index).await,
            }
        },

        Commands::Table { command } => {
            let service = commands::connect(config)?;
            match command {
                TableCommand::Create {
                    database,
                    table,
                    columns,
                    params,
                } => commands::table::create(service, database, table, columns, params).await,
            }
        },

        Commands::Transaction { command } => {
            let service = commands::connect(config)?;
            match command {
                TransactionCommand::Start { database } => commands::transaction::start(service, database).await,
                TransactionCommand::Commit {
                    id,
                    id_file,
                    build_secondary_index,
                } => commands::transaction::commit(service, config, id, id_file, build_secondary_index).await,
                TransactionCommand::Abort { id, id_file } => {
                    commands::transaction::abort(service, config, id, id_file).await
                },
            }
        },

        Commands::Chunks { command } => {
            let service = commands::connect(config)?;
            match command {
                ChunksCommand::Allocate {
                    dir,
                    id,
                    id_file,
                    table,
                    output,
                    load,
                } => {
                    let options = AllocateOptions {
                        dir,
                        id,
                        id_file,
                        table,
                        output,
                        load,
                    };
                    commands::chunks::allocate(service, config, options).await
                },
                ChunksCommand::Load { manifest } => commands::chunks::load(service, config, manifest).await,
            }
        },

        Commands::Ingest(args) => {
            let service = commands::connect(config)?;
            commands::ingest::run(service, config, args).await
        },
    }
}
