//! External system integrations for cosmos-dump.
//!
//! - [`database`] - Document store abstraction (trait-based)
//! - [`cosmosdb`] - Azure Cosmos DB implementation over the REST API
//! - `memory` - In-memory store for tests (`test-util` feature)
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with mock implementations. The export and import pipelines
//! only see `Arc<dyn DocumentStore>`.
//!
//! # Cosmos DB Adapter
//!
//! ```rust,no_run
//! use cosmos_dump::adapters::cosmosdb::CosmosDbClient;
//! use cosmos_dump::adapters::database::DocumentStore;
//! use cosmos_dump::config::{secret_string, CosmosDbConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CosmosDbConfig {
//!     endpoint: "https://account.documents.azure.com:443/".to_string(),
//!     key: secret_string("bWFzdGVyLWtleQ==".to_string()),
//!     database_name: "appdb".to_string(),
//!     request_timeout_seconds: 60,
//!     max_retries: 5,
//! };
//!
//! let client = CosmosDbClient::new(config)?;
//! client.test_connection().await?;
//! # Ok(())
//! # }
//! ```

pub mod cosmosdb;
pub mod database;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
