//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for cosmos-dump using clap.

pub mod commands;

use crate::config::{load_config_or_default, secret_string, DumpConfig};
use crate::domain::Result;
use clap::{Parser, Subcommand};

/// cosmos-dump - Cosmos DB bulk export/import
#[derive(Parser, Debug)]
#[command(name = "cosmos-dump")]
#[command(version, about, long_about = None)]
#[command(author = "cosmos-dump Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cosmos-dump.toml", env = "COSMOS_DUMP_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Cosmos DB account endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Cosmos DB master key
    #[arg(long, value_name = "KEY", hide = true)]
    pub key: Option<String>,

    /// Database name
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export collections to JSON files
    Export(commands::export::ExportArgs),

    /// Import JSON files into collections
    Import(commands::import::ImportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}

impl Cli {
    /// Load the configuration and apply the global flags on top
    ///
    /// The file is optional; without it the configuration starts from
    /// defaults plus `COSMOS_DUMP_*` environment variables.
    pub fn load_config(&self) -> Result<DumpConfig> {
        let mut config = load_config_or_default(&self.config)?;

        if let Some(ref level) = self.log_level {
            config.application.log_level = level.clone();
        }
        if let Some(ref endpoint) = self.endpoint {
            config.cosmosdb.endpoint = endpoint.clone();
        }
        if let Some(ref key) = self.key {
            config.cosmosdb.key = secret_string(key.clone());
        }
        if let Some(ref database) = self.database {
            config.cosmosdb.database_name = database.clone();
        }

        Ok(config)
    }
}
