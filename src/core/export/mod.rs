//! Export orchestration
//!
//! This module provides the export path:
//! - [`PartitionFetcher`] pages one partition range into a bounded queue
//! - [`BoundedWriter`] drains the queue into size-rotated files
//! - [`ExportCoordinator`] fans out fetchers per collection
//! - Summary and reporting

pub mod coordinator;
pub mod fetcher;
pub mod summary;
pub mod writer;

pub use coordinator::ExportCoordinator;
pub use fetcher::{FetchReport, PartitionFetcher};
pub use summary::{CollectionExport, ExportSummary};
pub use writer::{export_file_name, BoundedWriter, WriterConfig, WriterMessage, WriterReport};
