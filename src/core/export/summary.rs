//! Export summary and reporting
//!
//! This module defines structures for tracking and reporting export results.

use crate::core::cost::per_second;
use crate::core::report::TransferError;
use std::path::PathBuf;
use std::time::Duration;

/// Result of exporting one collection
#[derive(Debug, Clone)]
pub struct CollectionExport {
    /// Collection name
    pub collection: String,

    /// Partition ranges scanned
    pub ranges: usize,

    /// Items written
    pub items: u64,

    /// Completed output files, in creation order
    pub files: Vec<PathBuf>,

    /// Request charge spent on this collection
    pub request_charge: f64,

    /// Wall time for this collection
    pub duration: Duration,

    /// Ranges that stopped early
    pub range_errors: Vec<String>,
}

impl CollectionExport {
    /// Whether every range was read to the end
    pub fn is_complete(&self) -> bool {
        self.range_errors.is_empty()
    }
}

/// Summary of an export operation
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Folder the files were written to
    pub run_dir: PathBuf,

    /// Number of collections selected for export
    pub total_collections: usize,

    /// Collections exported completely
    pub successful_collections: usize,

    /// Collections abandoned or left incomplete
    pub failed_collections: usize,

    /// Items written across all collections
    pub total_items: u64,

    /// Output files written across all collections
    pub files_written: usize,

    /// Total request charge of the run
    pub request_charge: f64,

    /// Duration of the export
    pub duration: Duration,

    /// Per-collection results
    pub collections: Vec<CollectionExport>,

    /// Errors encountered during export
    pub errors: Vec<TransferError>,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new(run_dir: PathBuf) -> Self {
        Self {
            run_dir,
            total_collections: 0,
            successful_collections: 0,
            failed_collections: 0,
            total_items: 0,
            files_written: 0,
            request_charge: 0.0,
            duration: Duration::from_secs(0),
            collections: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Record a finished collection
    pub fn add_collection(&mut self, export: CollectionExport) {
        if export.is_complete() {
            self.successful_collections += 1;
        } else {
            self.failed_collections += 1;
        }
        self.total_items += export.items;
        self.files_written += export.files.len();
        self.collections.push(export);
    }

    /// Record a collection that could not be exported at all
    pub fn add_failed_collection(&mut self, error: TransferError) {
        self.failed_collections += 1;
        self.errors.push(error);
    }

    /// Add an error
    pub fn add_error(&mut self, error: TransferError) {
        self.errors.push(error);
    }

    /// Look up a collection's result
    pub fn collection(&self, name: &str) -> Option<&CollectionExport> {
        self.collections.iter().find(|c| c.collection == name)
    }

    /// Check if the export was successful (no failures)
    pub fn is_successful(&self) -> bool {
        self.failed_collections == 0 && self.errors.is_empty()
    }

    /// Request charge per second over the whole run
    pub fn charge_per_second(&self) -> f64 {
        per_second(self.request_charge, self.duration)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_dir = %self.run_dir.display(),
            total_collections = self.total_collections,
            successful = self.successful_collections,
            failed = self.failed_collections,
            items = self.total_items,
            files = self.files_written,
            request_charge = format!("{:.2}", self.request_charge),
            ru_per_second = format!("{:.2}", self.charge_per_second()),
            duration_secs = self.duration.as_secs(),
            "Export completed"
        );

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Export completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.kind,
                    message = %error.message,
                    context = ?error.context,
                    "Export error"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::TransferErrorKind;

    fn collection(name: &str, items: u64, range_errors: Vec<String>) -> CollectionExport {
        CollectionExport {
            collection: name.to_string(),
            ranges: 2,
            items,
            files: vec![PathBuf::from(format!("{name}_export.json"))],
            request_charge: 10.0,
            duration: Duration::from_secs(1),
            range_errors,
        }
    }

    #[test]
    fn test_export_summary_creation() {
        let summary = ExportSummary::new(PathBuf::from("export/appdb"));

        assert_eq!(summary.total_collections, 0);
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.duration, Duration::from_secs(0));
        assert!(summary.errors.is_empty());
        assert!(summary.is_successful());
    }

    #[test]
    fn test_add_collection_counts() {
        let mut summary = ExportSummary::new(PathBuf::from("out"));
        summary.add_collection(collection("orders", 7, vec![]));
        summary.add_collection(collection("users", 3, vec!["range 1 failed".to_string()]));

        assert_eq!(summary.successful_collections, 1);
        assert_eq!(summary.failed_collections, 1);
        assert_eq!(summary.total_items, 10);
        assert_eq!(summary.files_written, 2);
        assert!(!summary.is_successful());
        assert_eq!(summary.collection("orders").map(|c| c.items), Some(7));
    }

    #[test]
    fn test_failed_collection_recorded() {
        let mut summary = ExportSummary::new(PathBuf::from("out"));
        summary.add_failed_collection(
            TransferError::new(TransferErrorKind::Query, "ranges unavailable")
                .with_context("collection=orders"),
        );

        assert_eq!(summary.failed_collections, 1);
        assert_eq!(summary.errors[0].kind, TransferErrorKind::Query);
    }

    #[test]
    fn test_charge_per_second() {
        let mut summary =
            ExportSummary::new(PathBuf::from("out")).with_duration(Duration::from_secs(4));
        summary.request_charge = 10.0;
        assert_eq!(summary.charge_per_second(), 2.5);
    }
}
