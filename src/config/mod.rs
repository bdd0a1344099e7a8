//! Configuration management for cosmos-dump.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! cosmos-dump reads an optional TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `COSMOS_DUMP_*` environment overrides
//! - Default values for every optional setting
//! - Validation before any network call is made
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cosmos_dump::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cosmos-dump.toml")?;
//! config.validate()?;
//!
//! println!("Database: {}", config.cosmosdb.database_name);
//! println!("Encoding: {}", config.export.encoding);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and progress display
//! - [`CosmosDbConfig`] - Endpoint, master key, database, retry budget
//! - [`ExportConfig`] - Output directory, encoding, rotation threshold, filters
//! - [`ImportConfig`] - Concurrency, shuffling, collection filters
//! - [`LoggingConfig`] - Optional rolling JSON log file
//!
//! # Example Configuration
//!
//! ```toml
//! [cosmosdb]
//! endpoint = "https://your-account.documents.azure.com:443/"
//! key = "${COSMOS_DUMP_KEY}"
//! database_name = "appdb"
//!
//! [export]
//! encoding = "jsonl"
//! max_file_size_gb = 1.0
//!
//! [import]
//! concurrency = 100
//! shuffle = true
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_or_default};
pub use schema::{
    ApplicationConfig, CosmosDbConfig, DumpConfig, ExportConfig, ImportConfig, LoggingConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
