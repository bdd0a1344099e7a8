//! Export coordinator - main orchestrator for the export process
//!
//! Collections are exported concurrently. Within a collection, one fetcher
//! per partition range feeds a bounded queue drained by a single writer.

use crate::adapters::database::DocumentStore;
use crate::config::ExportConfig;
use crate::core::cost::CostMeter;
use crate::core::export::fetcher::PartitionFetcher;
use crate::core::export::summary::{CollectionExport, ExportSummary};
use crate::core::export::writer::{BoundedWriter, WriterConfig, WriterMessage};
use crate::core::progress::ProgressReporter;
use crate::core::report::{TransferError, TransferErrorKind};
use crate::domain::{DumpError, Result};
use crate::log_collection_failure;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Export coordinator
#[derive(Clone)]
pub struct ExportCoordinator {
    store: Arc<dyn DocumentStore>,
    config: Arc<ExportConfig>,
    meter: CostMeter,
    progress: Arc<ProgressReporter>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached; this is the only
    /// error that aborts a run.
    pub async fn new(store: Arc<dyn DocumentStore>, config: ExportConfig) -> Result<Self> {
        store.test_connection().await?;

        let meter = CostMeter::new();
        let progress = Arc::new(ProgressReporter::hidden(meter.clone()));

        Ok(Self {
            store,
            config: Arc::new(config),
            meter,
            progress,
        })
    }

    /// Draw a running progress line while exporting
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = Arc::new(ProgressReporter::new(
            self.meter.clone(),
            enabled,
            "exported",
        ));
        self
    }

    /// Cost meter shared by every fetcher of this coordinator
    pub fn meter(&self) -> &CostMeter {
        &self.meter
    }

    /// Execute the export
    ///
    /// 1. Lists collections and applies the name filter
    /// 2. Creates the run folder `<output_dir>/<database>_<YYYY-mm-dd-HH-MM>`
    /// 3. Exports every selected collection concurrently
    /// 4. Generates the summary
    pub async fn execute_export(&self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let run_dir = self.run_directory();
        let mut summary = ExportSummary::new(run_dir.clone());

        tracing::info!(
            database = %self.store.database_name(),
            run_dir = %run_dir.display(),
            "Starting export process"
        );

        let listing = self.store.list_collections().await.map_err(|e| {
            self.meter.record(e.request_charge());
            e
        })?;
        self.meter.record(listing.request_charge);

        let available: Vec<String> = listing.body.into_iter().map(|c| c.name).collect();
        let selected = self.select_collections(&available, &mut summary);
        summary.total_collections = selected.len() + summary.failed_collections;

        if selected.is_empty() {
            tracing::warn!("No collections to export");
            summary.request_charge = self.meter.total();
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        tokio::fs::create_dir_all(&run_dir).await.map_err(|e| {
            DumpError::Io(format!(
                "Failed to create output folder {}: {e}",
                run_dir.display()
            ))
        })?;

        let mut tasks = JoinSet::new();
        for name in selected {
            let coordinator = self.clone();
            let dir = run_dir.clone();
            tasks.spawn(async move {
                let result = coordinator.export_collection(&name, &dir).await;
                (name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(export))) => {
                    self.report_collection(&export);
                    for range_error in &export.range_errors {
                        summary.add_error(
                            TransferError::new(TransferErrorKind::Query, range_error.clone())
                                .with_context(format!("collection={name}")),
                        );
                    }
                    summary.add_collection(export);
                }
                Ok((name, Err(e))) => {
                    log_collection_failure!(name, &e, "Export of collection failed");
                    self.progress
                        .println(format!("{name}: export failed: {e}"));
                    summary.add_failed_collection(
                        TransferError::from_error(&e).with_context(format!("collection={name}")),
                    );
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Collection export task aborted");
                    summary.add_failed_collection(TransferError::new(
                        TransferErrorKind::Unknown,
                        format!("Collection export task aborted: {join_error}"),
                    ));
                }
            }
        }

        self.progress.finish();
        summary.request_charge = self.meter.total();
        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    /// Export one collection into `run_dir`
    ///
    /// Range failures are recorded on the result and the collection's file is
    /// still finalized; enumeration or writer failures abandon the collection.
    pub async fn export_collection(&self, name: &str, run_dir: &Path) -> Result<CollectionExport> {
        let started = Instant::now();
        let cost = self.meter.scope(name);

        let ranges = self.store.partition_ranges(name).await.map_err(|e| {
            cost.record(e.request_charge());
            e
        })?;
        cost.record(ranges.request_charge);
        let ranges = ranges.body;

        tracing::info!(
            collection = %name,
            ranges = ranges.len(),
            "Exporting collection"
        );

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity);
        let writer = BoundedWriter::new(
            WriterConfig {
                directory: run_dir.to_path_buf(),
                collection: name.to_string(),
                encoding: self.config.encoding,
                max_file_size: self.config.max_file_size_bytes(),
            },
            receiver,
        );
        let writer_task = tokio::spawn(writer.run());

        let mut fetchers = JoinSet::new();
        for range in &ranges {
            let fetcher = PartitionFetcher::new(
                Arc::clone(&self.store),
                name,
                range.clone(),
                sender.clone(),
                cost.clone(),
                Arc::clone(&self.progress),
            );
            fetchers.spawn(fetcher.run());
        }

        let mut range_errors = Vec::new();
        while let Some(joined) = fetchers.join_next().await {
            match joined {
                Ok(report) => {
                    if let Some(error) = report.error {
                        range_errors.push(format!("range {}: {error}", report.range));
                    }
                }
                Err(join_error) => {
                    range_errors.push(format!("fetcher task aborted: {join_error}"));
                }
            }
        }

        // A writer that already failed has dropped its receiver
        let _ = sender.send(WriterMessage::Finish).await;
        drop(sender);

        let report = writer_task
            .await
            .map_err(|e| DumpError::Export(format!("Writer task for {name} aborted: {e}")))??;

        Ok(CollectionExport {
            collection: name.to_string(),
            ranges: ranges.len(),
            items: report.items,
            files: report.files,
            request_charge: cost.total(),
            duration: started.elapsed(),
            range_errors,
        })
    }

    fn run_directory(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d-%H-%M");
        self.config
            .output_dir
            .join(format!("{}_{stamp}", self.store.database_name()))
    }

    fn select_collections(&self, available: &[String], summary: &mut ExportSummary) -> Vec<String> {
        if self.config.collections.is_empty() {
            return available.to_vec();
        }

        let mut selected = Vec::new();
        for wanted in &self.config.collections {
            if available.contains(wanted) {
                if !selected.contains(wanted) {
                    selected.push(wanted.clone());
                }
            } else {
                tracing::warn!(collection = %wanted, "Collection not found in database");
                summary.add_failed_collection(
                    TransferError::new(
                        TransferErrorKind::Configuration,
                        format!("Collection {wanted} does not exist"),
                    )
                    .with_context(format!("collection={wanted}")),
                );
            }
        }
        selected
    }

    fn report_collection(&self, export: &CollectionExport) {
        tracing::info!(
            collection = %export.collection,
            items = export.items,
            files = export.files.len(),
            request_charge = format!("{:.2}", export.request_charge),
            duration_ms = export.duration.as_millis() as u64,
            complete = export.is_complete(),
            "Collection exported"
        );

        let status = if export.is_complete() {
            "exported"
        } else {
            "partially exported"
        };
        self.progress.println(format!(
            "{}: {status} {} items to {} file(s), {:.2} RU",
            export.collection,
            export.items,
            export.files.len(),
            export.request_charge
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::{CollectionDescriptor, Encoding, IndexingPolicy, Item};
    use serde_json::json;
    use tempfile::TempDir;

    fn items(prefix: &str, count: usize) -> Vec<Item> {
        (0..count)
            .map(|i| Item::try_from(json!({"id": format!("{prefix}-{i}")})).unwrap())
            .collect()
    }

    fn export_config(dir: &TempDir) -> ExportConfig {
        ExportConfig {
            output_dir: dir.path().to_path_buf(),
            ..ExportConfig::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new("appdb");
        store.set_unreachable(true);

        let result = ExportCoordinator::new(Arc::new(store), export_config(&dir)).await;
        assert!(result.err().map(|e| e.is_fatal()).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_collection_filter_and_missing_name() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new("appdb");
        for name in ["orders", "users"] {
            store.add_collection(
                CollectionDescriptor::new(name, "/id", IndexingPolicy::consistent()),
                vec![items(name, 2)],
            );
        }

        let mut config = export_config(&dir);
        config.collections = vec!["orders".to_string(), "ghost".to_string()];
        config.encoding = Encoding::Jsonl;

        let coordinator = ExportCoordinator::new(Arc::new(store), config).await.unwrap();
        let summary = coordinator.execute_export().await.unwrap();

        assert_eq!(summary.total_collections, 2);
        assert_eq!(summary.successful_collections, 1);
        assert_eq!(summary.failed_collections, 1);
        assert!(summary.collection("users").is_none());
        assert!(summary.run_dir.join("orders_export.jsonl").exists());
    }

    #[tokio::test]
    async fn test_failed_range_marks_collection_incomplete() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new("appdb");
        store.add_collection(
            CollectionDescriptor::new("orders", "/id", IndexingPolicy::consistent()),
            vec![items("a", 3), items("b", 4)],
        );
        store.fail_range("orders", "1");

        let coordinator = ExportCoordinator::new(Arc::new(store), export_config(&dir))
            .await
            .unwrap();
        let summary = coordinator.execute_export().await.unwrap();

        let orders = summary.collection("orders").unwrap();
        assert_eq!(orders.items, 3);
        assert!(!orders.is_complete());
        assert!(!summary.is_successful());

        let text = std::fs::read_to_string(&orders.files[0]).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 3);
    }
}
