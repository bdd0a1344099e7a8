//! Document store abstraction layer
//!
//! The export and import pipelines talk to the store only through
//! [`DocumentStore`], so they run unchanged against Cosmos DB or the
//! in-memory store used in tests.

pub mod traits;

pub use traits::{DocumentStore, Page, StoreResponse};
