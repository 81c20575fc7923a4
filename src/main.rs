//! chansync CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::{CommandFactory, Parser};
use std::process::ExitCode;

use chansync::cli::{Cli, Commands};
use chansync::core::logging;
use chansync::storage::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(|| logging::parse_log_level_from_env().map(logging::LogLevel::from_tracing_level))
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> chansync::Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "chansync", &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings::resolve(cli.gateway_url.as_deref(), cli.db.as_deref())?;

    match &cli.command {
        Commands::Provider(command) => chansync::cli::provider::execute_provider(command, &settings),
        Commands::Group(command) => chansync::cli::provider::execute_group(command, &settings),
        Commands::Import(args) => chansync::cli::import::execute(args, &settings).await,
        Commands::Offers(args) => chansync::cli::offers::execute(args, &settings),
        Commands::Probe(args) => chansync::cli::probe::execute(args, &settings).await,
        Commands::Sync(args) => chansync::cli::sync::execute(args, &settings).await,
        Commands::Aliases => chansync::cli::aliases::execute(&settings).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
