//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the cosmos-dump configuration without contacting the account.

use crate::cli::commands::{EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::DumpConfig;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str, config: DumpConfig) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration: {config_path}");
        println!();

        match config.validate() {
            Ok(()) => {
                println!("✅ Configuration is valid");
                println!();
                print_summary(&config);
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(EXIT_CONFIG)
            }
        }
    }
}

fn print_summary(config: &DumpConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Cosmos DB Endpoint: {}", config.cosmosdb.endpoint);
    println!("  Cosmos DB Database: {}", config.cosmosdb.database_name);
    println!(
        "  Cosmos DB Key: {}",
        config.cosmosdb.key.expose_secret().masked()
    );
    println!("  Throttle Retries: {}", config.cosmosdb.max_retries);
    println!("  Export Directory: {}", config.export.output_dir.display());
    println!("  Export Encoding: {}", config.export.encoding);
    match config.export.max_file_size_gb {
        Some(size) => println!("  Max File Size: {size} GiB"),
        None => println!("  Max File Size: unlimited"),
    }
    if !config.export.collections.is_empty() {
        println!("  Collections: {:?}", config.export.collections);
    }
    println!("  Import Concurrency: {}", config.import.concurrency);
    println!("  Import Shuffle: {}", config.import.shuffle);
    println!("  Import Workers: {}", config.import.workers);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    #[tokio::test]
    async fn test_default_config_is_rejected() {
        let code = ValidateArgs {}
            .execute("cosmos-dump.toml", DumpConfig::default())
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }

    #[tokio::test]
    async fn test_complete_config_is_accepted() {
        let mut config = DumpConfig::default();
        config.cosmosdb.endpoint = "https://account.documents.azure.com:443/".to_string();
        config.cosmosdb.key = secret_string("a2V5".to_string());
        config.cosmosdb.database_name = "appdb".to_string();

        let code = ValidateArgs {}
            .execute("cosmos-dump.toml", config)
            .await
            .unwrap();
        assert_eq!(code, EXIT_SUCCESS);
    }
}
