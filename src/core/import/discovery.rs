//! Import job discovery
//!
//! Turns a file or directory path into import jobs grouped by destination
//! collection. Nothing is persisted; jobs are recomputed on every run.

use crate::domain::{DumpError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One file to import into one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    /// Collection the items are written to
    pub destination: String,

    /// Collection the file was exported from
    pub source: String,

    /// File to read
    pub path: PathBuf,

    /// 0 for `<name>_export.*`, n for `<name>_export_<n>.*`
    pub rotation_index: usize,
}

/// Optional source and destination collection filters
#[derive(Debug, Clone, Default)]
pub struct ImportFilters {
    /// Only import files exported from this collection
    pub source_collection: Option<String>,

    /// Import into this collection instead of the source name
    pub destination_collection: Option<String>,
}

/// Import jobs grouped by destination collection
///
/// Jobs of one destination are ordered by rotation index and run one after
/// another.
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub groups: BTreeMap<String, Vec<ImportJob>>,
}

impl ImportPlan {
    fn push(&mut self, job: ImportJob) {
        self.groups
            .entry(job.destination.clone())
            .or_default()
            .push(job);
    }

    /// Total number of jobs
    pub fn job_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Destination collections, sorted
    pub fn destinations(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn export_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<name>.+?)_export(?:_(?P<index>\d+))?\.(?:json|jsonl)$")
            .expect("export file pattern is a valid regex")
    })
}

/// Split an export file name into collection name and rotation index
///
/// Returns `None` for names that are not export files.
pub fn parse_export_file_name(file_name: &str) -> Option<(String, usize)> {
    let caps = export_name_pattern().captures(file_name)?;
    let name = caps.name("name")?.as_str().to_string();
    let index = match caps.name("index") {
        Some(n) => n.as_str().parse().ok()?,
        None => 0,
    };
    Some((name, index))
}

/// Discover import jobs under `path`
///
/// A file yields one job whose collection is the destination override or the
/// name derived from the file. A directory yields one job per export file
/// directly inside it; files are filtered by source collection and renamed
/// to the destination. A destination given without a source only picks files
/// exported from a collection of that name.
///
/// # Errors
///
/// Returns an error if the path does not exist or cannot be listed.
pub fn discover_jobs(path: &Path, filters: &ImportFilters) -> Result<ImportPlan> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        DumpError::Configuration(format!("Import path {} is not readable: {e}", path.display()))
    })?;

    let mut plan = ImportPlan::default();

    if metadata.is_file() {
        plan.push(file_job(path, filters)?);
        return Ok(plan);
    }

    let wanted_source = filters
        .source_collection
        .as_ref()
        .or(filters.destination_collection.as_ref());

    let entries = std::fs::read_dir(path).map_err(|e| {
        DumpError::Io(format!("Failed to list {}: {e}", path.display()))
    })?;

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some((source, rotation_index)) = file_name.to_str().and_then(parse_export_file_name)
        else {
            continue;
        };

        if let Some(wanted) = wanted_source {
            if &source != wanted {
                continue;
            }
        }

        let destination = filters
            .destination_collection
            .clone()
            .unwrap_or_else(|| source.clone());

        plan.push(ImportJob {
            destination,
            source,
            path: entry.path(),
            rotation_index,
        });
    }

    for jobs in plan.groups.values_mut() {
        jobs.sort_by(|a, b| {
            a.rotation_index
                .cmp(&b.rotation_index)
                .then_with(|| a.path.cmp(&b.path))
        });
    }

    tracing::debug!(
        path = %path.display(),
        jobs = plan.job_count(),
        destinations = plan.groups.len(),
        "Import jobs discovered"
    );
    Ok(plan)
}

fn file_job(path: &Path, filters: &ImportFilters) -> Result<ImportJob> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            DumpError::Configuration(format!("Unsupported file name: {}", path.display()))
        })?;

    let (source, rotation_index) = parse_export_file_name(file_name).unwrap_or_else(|| {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        (stem, 0)
    });

    let destination = filters
        .destination_collection
        .clone()
        .unwrap_or_else(|| source.clone());

    Ok(ImportJob {
        destination,
        source,
        path: path.to_path_buf(),
        rotation_index,
    })
}
