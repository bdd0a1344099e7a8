//! Export command implementation
//!
//! This module implements the `export` command, which writes every selected
//! collection of the database into JSON or JSON lines files.

use crate::adapters::cosmosdb::CosmosDbClient;
use crate::cli::commands::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::config::DumpConfig;
use crate::core::export::{ExportCoordinator, ExportSummary};
use crate::domain::Encoding;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the export command
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Export only this collection (repeatable)
    #[arg(long = "collection", value_name = "NAME")]
    pub collections: Vec<String>,

    /// Write newline-delimited JSON instead of a JSON array
    #[arg(long)]
    pub jsonl: bool,

    /// Rotate output files above this size in GiB
    #[arg(long, value_name = "GB")]
    pub max_file_size: Option<f64>,

    /// Directory under which the run folder is created
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

impl ExportArgs {
    /// Apply the command flags to the loaded configuration
    pub fn apply(&self, config: &mut DumpConfig) {
        if !self.collections.is_empty() {
            tracing::info!(collections = ?self.collections, "Overriding collections from CLI");
            config.export.collections = self.collections.clone();
        }
        if self.jsonl {
            config.export.encoding = Encoding::Jsonl;
        }
        if let Some(size) = self.max_file_size {
            config.export.max_file_size_gb = Some(size);
        }
        if let Some(ref dir) = self.output_dir {
            config.export.output_dir = dir.clone();
        }
    }

    /// Execute the export command
    pub async fn execute(&self, mut config: DumpConfig) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");
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

        let coordinator = match ExportCoordinator::new(store, config.export.clone()).await {
            Ok(c) => c.with_progress(config.application.progress),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export coordinator");
                eprintln!("Failed to connect to Cosmos DB: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        println!(
            "🚀 Exporting database {} ({})...",
            config.cosmosdb.database_name, config.export.encoding
        );
        println!();

        let summary = match coordinator.execute_export().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        print_summary(&summary);
        Ok(exit_code(&summary))
    }
}

fn print_summary(summary: &ExportSummary) {
    println!();
    println!("📊 Export Summary:");
    println!("  Output: {}", summary.run_dir.display());
    println!("  Collections: {}", summary.total_collections);
    println!("  Successful: {}", summary.successful_collections);
    println!("  Failed: {}", summary.failed_collections);
    println!("  Items: {}", summary.total_items);
    println!("  Files: {}", summary.files_written);
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
        println!("✅ Export completed successfully!");
    } else {
        println!("⚠️  Export completed with failures");
    }
}

fn exit_code(summary: &ExportSummary) -> i32 {
    if summary.is_successful() {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL
    }
}
