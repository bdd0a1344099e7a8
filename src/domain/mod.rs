//! Domain models and types for cosmos-dump.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Transfer unit** ([`Item`])
//! - **Collection metadata** ([`CollectionDescriptor`], [`IndexingPolicy`], [`PartitionRange`])
//! - **File encodings** ([`Encoding`])
//! - **Error types** ([`DumpError`], [`CosmosDbError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, DumpError>`]:
//!
//! ```rust
//! use cosmos_dump::domain::{DumpError, Result};
//!
//! fn example() -> Result<()> {
//!     let encoding: cosmos_dump::domain::Encoding = "jsonl".parse()?;
//!     assert_eq!(encoding.extension(), "jsonl");
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod encoding;
pub mod errors;
pub mod item;
pub mod result;

// Re-export commonly used types for convenience
pub use collection::{
    CollectionDescriptor, IndexingPolicy, PartitionRange, DEFAULT_PARTITION_KEY_PATH,
};
pub use encoding::Encoding;
pub use errors::{CosmosDbError, DumpError};
pub use item::Item;
pub use result::Result;
