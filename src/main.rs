// cosmos-dump - Cosmos DB bulk export/import
// Copyright (c) 2025 cosmos-dump Contributors
// Licensed under the MIT License

use clap::Parser;
use cosmos_dump::cli::commands::{EXIT_CONFIG, EXIT_FATAL};
use cosmos_dump::cli::{Cli, Commands};
use cosmos_dump::config::{DumpConfig, LoggingConfig};
use cosmos_dump::logging::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let loaded = cli.load_config();

    let (log_level, logging_config) = match loaded {
        Ok(ref config) => (config.application.log_level.clone(), config.logging.clone()),
        Err(_) => (
            cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
            LoggingConfig::default(),
        ),
    };
    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_CONFIG);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "cosmos-dump - Cosmos DB bulk export/import"
    );

    let exit_code = match loaded {
        Ok(config) => match execute_command(&cli, config).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "Command execution failed");
                eprintln!("Error: {e}");
                EXIT_FATAL
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            eprintln!("Failed to load configuration: {e}");
            EXIT_CONFIG
        }
    };

    // process::exit skips destructors; flush the log file first
    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, config: DumpConfig) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Export(args) => args.execute(config).await,
        Commands::Import(args) => args.execute(config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config, config).await,
    }
}
