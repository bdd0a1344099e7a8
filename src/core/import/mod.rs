//! Import orchestration
//!
//! This module provides the import path:
//! - [`discover_jobs`] turns a file or directory into jobs per destination
//! - [`ItemReader`] streams documents out of JSON array or JSON lines files
//! - [`ShuffleBuffer`] approximately randomizes item order in bounded memory
//! - [`UpsertThrottler`] bounds concurrent upserts
//! - [`IndexingLifecycle`] disables and restores indexing around a bulk load
//! - [`ImportCoordinator`] drives the pipeline

pub mod coordinator;
pub mod discovery;
pub mod indexing;
pub mod parser;
pub mod shuffle;
pub mod summary;
pub mod throttle;

pub use coordinator::ImportCoordinator;
pub use discovery::{discover_jobs, parse_export_file_name, ImportFilters, ImportJob, ImportPlan};
pub use indexing::IndexingLifecycle;
pub use parser::{open_items, sniff_encoding, spawn_parser, ItemReader, ParseMode, Record};
pub use shuffle::{ShuffleBuffer, DEFAULT_SHUFFLE_CAPACITY};
pub use summary::{FileImport, ImportSummary};
pub use throttle::{UpsertCounts, UpsertSession, UpsertThrottler, DEFAULT_SCHEDULING_HEADROOM};
