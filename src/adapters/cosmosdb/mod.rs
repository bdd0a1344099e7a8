//! Azure Cosmos DB integration
//!
//! [`CosmosDbClient`] implements [`DocumentStore`](crate::adapters::database::DocumentStore)
//! over the Cosmos DB REST API with master-key authentication.

pub mod auth;
pub mod client;
pub mod models;

pub use client::CosmosDbClient;
