//! Import command implementation
//!
//! This module implements the `import` command, which upserts the documents
//! of export files back into collections.

use crate::adapters::cosmosdb::CosmosDbClient;
use crate::cli::commands::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::config::DumpConfig;
use crate::core::import::{ImportCoordinator, ImportSummary};
use crate::domain::DumpError;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Export file or run folder to import
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Destination collection (defaults to the name in the file name)
    #[arg(long, value_name = "DEST")]
    pub collection: Option<String>,

    /// Only import files exported from this collection
    #[arg(long, value_name = "SRC")]
    pub from_collection: Option<String>,

    /// Maximum concurrent upserts
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Approximately shuffle items before upserting
    #[arg(long)]
    pub shuffle: bool,

    /// Destination collections imported concurrently
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl ImportArgs {
    /// Apply the command flags to the loaded configuration
    pub fn apply(&self, config: &mut DumpConfig) {
        config.import.path = Some(self.path.clone());
        if let Some(ref collection) = self.collection {
            config.import.destination_collection = Some(collection.clone());
        }
        if let Some(ref collection) = self.from_collection {
            config.import.source_collection = Some(collection.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.import.concurrency = concurrency;
        }
        if self.shuffle {
            config.import.shuffle = true;
        }
        if let Some(workers) = self.workers {
            config.import.workers = workers;
        }
    }

    /// Execute the import command
    pub async fn execute(&self, mut config: DumpConfig) -> anyhow::Result<i32> {
        tracing::info!(path = %self.path.display(), "Starting import command");
        self.apply(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        let store = match CosmosDbClient::new(config.cosmosdb.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create Cosmos DB client");
                eprintln!("Failed to create Cosmos DB client: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let coordinator = match ImportCoordinator::new(store, config.import.clone()).await {
            Ok(c) => c.with_progress(config.application.progress),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create import coordinator");
                eprintln!("Failed to connect to Cosmos DB: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        println!(
            "🚀 Importing {} into database {}...",
            self.path.display(),
            config.cosmosdb.database_name
        );
        println!();

        let summary = match coordinator.execute_import().await {
            Ok(s) => s,
            Err(DumpError::Configuration(e)) => {
                tracing::error!(error = %e, "Import path rejected");
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
            Err(e) => {
                tracing::error!(error = %e, "Import failed");
                eprintln!("Import failed: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        print_summary(&summary);
        Ok(if summary.is_successful() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        })
    }
}

fn print_summary(summary: &ImportSummary) {
    println!();
    println!("📊 Import Summary:");
    println!("  Source: {}", summary.source_path.display());
    println!("  Files: {}", summary.total_files);
    println!("  Successful: {}", summary.successful_files);
    println!("  Failed: {}", summary.failed_files);
    println!("  Items imported: {}", summary.total_imported);
    println!("  Items failed: {}", summary.total_failed);
    println!("  Collections created: {}", summary.collections_created);
    println!("  Request charge: {:.2} RU", summary.request_charge);
    println!("  Throughput: {:.2} RU/s", summary.charge_per_second());
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {:?}: {}", error.kind, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
        println!();
    }

    if summary.is_successful() {
        println!("✅ Import completed successfully!");
    } else {
        println!("⚠️  Import completed with failures");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(path: &str) -> ImportArgs {
        ImportArgs {
            path: PathBuf::from(path),
            collection: None,
            from_collection: None,
            concurrency: None,
            shuffle: false,
            workers: None,
        }
    }

    #[test]
    fn test_import_args_set_path_only() {
        let mut config = DumpConfig::default();
        args("export/appdb").apply(&mut config);

        assert_eq!(config.import.path, Some(PathBuf::from("export/appdb")));
        assert_eq!(config.import.concurrency, 100);
        assert!(!config.import.shuffle);
        assert!(config.import.destination_collection.is_none());
    }

    #[test]
    fn test_import_args_with_overrides() {
        let mut config = DumpConfig::default();
        ImportArgs {
            collection: Some("orders_v2".to_string()),
            from_collection: Some("orders".to_string()),
            concurrency: Some(8),
            shuffle: true,
            workers: Some(3),
            ..args("export/appdb")
        }
        .apply(&mut config);

        assert_eq!(config.import.destination_collection.as_deref(), Some("orders_v2"));
        assert_eq!(config.import.source_collection.as_deref(), Some("orders"));
        assert_eq!(config.import.concurrency, 8);
        assert!(config.import.shuffle);
        assert_eq!(config.import.workers, 3);
    }

    #[tokio::test]
    async fn test_invalid_concurrency_exit_code() {
        let mut config = DumpConfig::default();
        config.cosmosdb.endpoint = "https://localhost:8081/".to_string();
        config.cosmosdb.key = crate::config::secret_string("a2V5".to_string());
        config.cosmosdb.database_name = "appdb".to_string();

        let code = ImportArgs {
            concurrency: Some(0),
            ..args("export/appdb")
        }
        .execute(config)
        .await
        .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
