//! Import coordinator - main orchestrator for the import process
//!
//! Jobs are grouped by destination collection. Groups run concurrently up to
//! the configured worker count; the files of one group run one after another
//! between the group's indexing prepare and restore steps. Within a file,
//! items flow parser -> shuffle buffer -> throttled upserts.

use crate::adapters::database::DocumentStore;
use crate::config::ImportConfig;
use crate::core::cost::{CostMeter, ScopedCost};
use crate::core::import::discovery::{discover_jobs, ImportFilters, ImportJob};
use crate::core::import::indexing::IndexingLifecycle;
use crate::core::import::parser::{spawn_parser, Record};
use crate::core::import::shuffle::ShuffleBuffer;
use crate::core::import::summary::{FileImport, ImportSummary};
use crate::core::import::throttle::UpsertThrottler;
use crate::core::progress::ProgressReporter;
use crate::core::report::{TransferError, TransferErrorKind};
use crate::domain::{CollectionDescriptor, DumpError, Result};
use crate::log_collection_failure;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Parsed records buffered between the parser thread and the upserts
const PARSE_QUEUE_CAPACITY: usize = 100;

/// Outcome of one destination group
struct GroupImport {
    files: Vec<FileImport>,
    created: bool,
    restored: bool,
}

/// Import coordinator
#[derive(Clone)]
pub struct ImportCoordinator {
    store: Arc<dyn DocumentStore>,
    config: Arc<ImportConfig>,
    throttler: UpsertThrottler,
    meter: CostMeter,
    progress: Arc<ProgressReporter>,
}

impl ImportCoordinator {
    /// Create a new import coordinator
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    pub async fn new(store: Arc<dyn DocumentStore>, config: ImportConfig) -> Result<Self> {
        store.test_connection().await?;

        let throttler = UpsertThrottler::new(
            Arc::clone(&store),
            config.concurrency,
            config.scheduling_headroom,
        );
        let meter = CostMeter::new();
        let progress = Arc::new(ProgressReporter::hidden(meter.clone()));

        Ok(Self {
            store,
            config: Arc::new(config),
            throttler,
            meter,
            progress,
        })
    }

    /// Draw a running progress line while importing
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = Arc::new(ProgressReporter::new(
            self.meter.clone(),
            enabled,
            "imported",
        ));
        self
    }

    /// Cost meter shared by every upsert of this coordinator
    pub fn meter(&self) -> &CostMeter {
        &self.meter
    }

    /// Execute the import
    ///
    /// 1. Discovers jobs under the configured path
    /// 2. Imports every destination group, `workers` at a time
    /// 3. Generates the summary
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured or it cannot be read.
    pub async fn execute_import(&self) -> Result<ImportSummary> {
        let start_time = Instant::now();
        let path = self.config.path.clone().ok_or_else(|| {
            DumpError::Configuration("No import path configured".to_string())
        })?;

        let filters = ImportFilters {
            source_collection: self.config.source_collection.clone(),
            destination_collection: self.config.destination_collection.clone(),
        };
        let plan = discover_jobs(&path, &filters)?;

        let mut summary = ImportSummary::new(path.clone());
        summary.total_files = plan.job_count();

        tracing::info!(
            path = %path.display(),
            files = plan.job_count(),
            destinations = plan.groups.len(),
            concurrency = self.throttler.limit(),
            shuffle = self.config.shuffle,
            "Starting import process"
        );

        if plan.is_empty() {
            tracing::warn!(path = %path.display(), "No export files found to import");
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        let workers = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();
        for (destination, jobs) in plan.groups {
            let coordinator = self.clone();
            let workers = Arc::clone(&workers);
            tasks.spawn(async move {
                let job_count = jobs.len();
                let result = match workers.acquire_owned().await {
                    Ok(_permit) => coordinator.import_group(&destination, jobs).await,
                    Err(_) => Err(DumpError::Import("worker pool closed".to_string())),
                };
                (destination, job_count, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(group))) => {
                    summary.collections_created += usize::from(group.created);
                    summary.policies_restored += usize::from(group.restored);
                    for file in group.files {
                        if let Some(ref error) = file.error {
                            summary.add_error(
                                TransferError::new(TransferErrorKind::Parse, error.clone())
                                    .with_context(format!("file={}", file.path.display())),
                            );
                        }
                        summary.add_file(file);
                    }
                }
                Ok((destination, job_count, Err(e))) => {
                    log_collection_failure!(destination, &e, "Import into destination failed");
                    self.progress
                        .println(format!("{destination}: import failed: {e}"));
                    summary.add_skipped_files(
                        job_count,
                        TransferError::from_error(&e)
                            .with_context(format!("collection={destination}")),
                    );
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Import group task aborted");
                    summary.add_error(TransferError::new(
                        TransferErrorKind::Unknown,
                        format!("Import group task aborted: {join_error}"),
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

    /// Import every job of one destination, in order
    async fn import_group(&self, destination: &str, jobs: Vec<ImportJob>) -> Result<GroupImport> {
        let cost = self.meter.scope(destination);
        let lifecycle = IndexingLifecycle::prepare(
            &self.store,
            destination,
            &self.config.partition_key_path,
            &cost,
        )
        .await?;

        let mut files = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let file = self.import_file(lifecycle.collection(), job, &cost).await;
            self.report_file(&file);
            files.push(file);
        }

        let created = lifecycle.created();
        let restored = lifecycle.finish(&self.store, &cost).await;

        Ok(GroupImport {
            files,
            created,
            restored,
        })
    }

    /// Stream one file into `collection`
    ///
    /// Parse failures end the file; items already parsed are still written.
    async fn import_file(
        &self,
        collection: &CollectionDescriptor,
        job: &ImportJob,
        cost: &ScopedCost,
    ) -> FileImport {
        let started = Instant::now();
        let charge_before = cost.total();

        tracing::info!(
            file = %job.path.display(),
            collection = %collection.name,
            "Importing file"
        );

        let session =
            self.throttler
                .session(collection.clone(), cost.clone(), Arc::clone(&self.progress));
        let mut shuffle = ShuffleBuffer::new(self.config.shuffle_capacity, self.config.shuffle);
        let mut parsed = spawn_parser(job.path.clone(), PARSE_QUEUE_CAPACITY);
        let mut error = None;

        while let Some(record) = parsed.receiver.recv().await {
            match record {
                Ok(Record::Item(item)) => {
                    if let Some(item) = shuffle.push(item) {
                        session.submit(item).await;
                    }
                }
                Ok(Record::Skipped(reason)) => session.record_failure(&reason),
                Err(e) => {
                    tracing::error!(
                        file = %job.path.display(),
                        error = %e,
                        "Import file could not be read to the end"
                    );
                    error = Some(e.to_string());
                    break;
                }
            }
        }

        for item in shuffle.finish() {
            session.submit(item).await;
        }

        drop(parsed.receiver);
        if let Err(join_error) = parsed.task.await {
            error.get_or_insert_with(|| format!("parser task aborted: {join_error}"));
        }

        let counts = session.finish().await;

        FileImport {
            path: job.path.clone(),
            destination: collection.name.clone(),
            imported: counts.imported,
            failed: counts.failed,
            request_charge: cost.total() - charge_before,
            duration: started.elapsed(),
            error,
        }
    }

    fn report_file(&self, file: &FileImport) {
        tracing::info!(
            file = %file.path.display(),
            collection = %file.destination,
            imported = file.imported,
            failed = file.failed,
            request_charge = format!("{:.2}", file.request_charge),
            duration_ms = file.duration.as_millis() as u64,
            complete = file.is_complete(),
            "File imported"
        );

        let name = file
            .path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| file.path.clone());
        let line = match file.error {
            None => format!(
                "{}: imported {} items into {}, {} failed, {:.2} RU",
                name.display(),
                file.imported,
                file.destination,
                file.failed,
                file.request_charge
            ),
            Some(ref error) => format!(
                "{}: stopped after {} items into {}: {error}",
                name.display(),
                file.imported,
                file.destination
            ),
        };
        self.progress.println(line);
    }
}
