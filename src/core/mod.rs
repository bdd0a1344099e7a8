//! Core transfer logic.
//!
//! # Modules
//!
//! - [`export`] - Partition-parallel export into size-rotated files
//! - [`import`] - Streaming import with shuffling, throttling and indexing control
//! - [`cost`] - Request charge accounting and throughput
//! - [`progress`] - Running progress line
//! - [`report`] - Errors recorded in run summaries
//!
//! # Example
//!
//! ```rust,no_run
//! use cosmos_dump::adapters::cosmosdb::CosmosDbClient;
//! use cosmos_dump::config::load_config;
//! use cosmos_dump::core::export::ExportCoordinator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cosmos-dump.toml")?;
//! let store = Arc::new(CosmosDbClient::new(config.cosmosdb.clone())?);
//!
//! let coordinator = ExportCoordinator::new(store, config.export.clone()).await?;
//! let summary = coordinator.execute_export().await?;
//!
//! println!("Exported {} items", summary.total_items);
//! println!("Request charge: {:.2} RU", summary.request_charge);
//! # Ok(())
//! # }
//! ```

pub mod cost;
pub mod export;
pub mod import;
pub mod progress;
pub mod report;
