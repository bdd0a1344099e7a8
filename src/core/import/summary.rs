//! Import summary and reporting

use crate::core::cost::per_second;
use crate::core::report::TransferError;
use std::path::PathBuf;
use std::time::Duration;

/// Result of importing one file
#[derive(Debug, Clone)]
pub struct FileImport {
    /// File that was read
    pub path: PathBuf,

    /// Collection the items went to
    pub destination: String,

    /// Items upserted
    pub imported: u64,

    /// Items that failed to upsert or were not documents
    pub failed: u64,

    /// Request charge spent on this file
    pub request_charge: f64,

    /// Wall time for this file
    pub duration: Duration,

    /// Error that stopped the file early, if any
    pub error: Option<String>,
}

impl FileImport {
    /// Whether the file was read to the end
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of an import operation
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// File or directory that was imported
    pub source_path: PathBuf,

    /// Files discovered
    pub total_files: usize,

    /// Files read to the end
    pub successful_files: usize,

    /// Files stopped early or skipped
    pub failed_files: usize,

    /// Items upserted across all files
    pub total_imported: u64,

    /// Items that could not be imported
    pub total_failed: u64,

    /// Destination collections created by this run
    pub collections_created: usize,

    /// Destination collections whose indexing policy was restored
    pub policies_restored: usize,

    /// Total request charge of the run
    pub request_charge: f64,

    /// Duration of the import
    pub duration: Duration,

    /// Per-file results, in completion order
    pub files: Vec<FileImport>,

    /// Errors encountered during import
    pub errors: Vec<TransferError>,
}

impl ImportSummary {
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            source_path,
            total_files: 0,
            successful_files: 0,
            failed_files: 0,
            total_imported: 0,
            total_failed: 0,
            collections_created: 0,
            policies_restored: 0,
            request_charge: 0.0,
            duration: Duration::from_secs(0),
            files: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Record a processed file
    pub fn add_file(&mut self, file: FileImport) {
        if file.is_complete() {
            self.successful_files += 1;
        } else {
            self.failed_files += 1;
        }
        self.total_imported += file.imported;
        self.total_failed += file.failed;
        self.files.push(file);
    }

    /// Record files that were never opened
    pub fn add_skipped_files(&mut self, count: usize, error: TransferError) {
        self.failed_files += count;
        self.errors.push(error);
    }

    /// Add an error
    pub fn add_error(&mut self, error: TransferError) {
        self.errors.push(error);
    }

    /// Items imported into `destination`
    pub fn imported_into(&self, destination: &str) -> u64 {
        self.files
            .iter()
            .filter(|f| f.destination == destination)
            .map(|f| f.imported)
            .sum()
    }

    /// Check if the import was successful (no failures)
    pub fn is_successful(&self) -> bool {
        self.failed_files == 0 && self.total_failed == 0 && self.errors.is_empty()
    }

    /// Request charge per second over the whole run
    pub fn charge_per_second(&self) -> f64 {
        per_second(self.request_charge, self.duration)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            source = %self.source_path.display(),
            total_files = self.total_files,
            successful = self.successful_files,
            failed = self.failed_files,
            imported = self.total_imported,
            failed_items = self.total_failed,
            collections_created = self.collections_created,
            request_charge = format!("{:.2}", self.request_charge),
            ru_per_second = format!("{:.2}", self.charge_per_second()),
            duration_secs = self.duration.as_secs(),
            "Import completed"
        );

        for error in &self.errors {
            tracing::warn!(
                error_type = ?error.kind,
                message = %error.message,
                context = ?error.context,
                "Import error"
            );
        }
    }
}
