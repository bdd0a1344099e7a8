// cosmos-dump - Cosmos DB bulk export/import
// Copyright (c) 2025 cosmos-dump Contributors
// Licensed under the MIT License

//! # cosmos-dump - Cosmos DB bulk export/import
//!
//! cosmos-dump moves whole collections between an Azure Cosmos DB database
//! and flat JSON files for backup and migration. Both directions stream
//! through bounded memory and report the request charge they spend.
//!
//! ## Overview
//!
//! - **Export** fans out one fetcher per partition range, feeds a bounded
//!   queue and writes JSON array or JSON lines files, rotating them by size
//! - **Import** streams files back, optionally shuffles them through a
//!   reservoir, and upserts with bounded concurrency while indexing is
//!   switched off on the destination
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Export and import pipelines, cost accounting, progress
//! - [`adapters`] - Document store trait, Cosmos DB REST client
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cosmos_dump::adapters::cosmosdb::CosmosDbClient;
//! use cosmos_dump::config::load_config;
//! use cosmos_dump::core::import::ImportCoordinator;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = load_config("cosmos-dump.toml")?;
//!     config.import.path = Some(PathBuf::from("export/appdb_2025-01-01-00-00"));
//!
//!     let store = Arc::new(CosmosDbClient::new(config.cosmosdb.clone())?);
//!     let coordinator = ImportCoordinator::new(store, config.import.clone()).await?;
//!     let summary = coordinator.execute_import().await?;
//!
//!     println!("Imported {} items", summary.total_imported);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`]. Only a store that cannot be
//! reached aborts a run; failures of a collection, a file or a single item
//! are recorded in the run summary.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
