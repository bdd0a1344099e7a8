//! Configuration schema types

use crate::config::{secret_string, SecretString};
use crate::domain::{Encoding, DEFAULT_PARTITION_KEY_PATH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bytes per GiB, the unit of `export.max_file_size_gb`
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Main cosmos-dump configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Cosmos DB account and database
    #[serde(default)]
    pub cosmosdb: CosmosDbConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Import settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DumpConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.cosmosdb.validate()?;
        self.export.validate()?;
        self.import.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Show the interactive progress line
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            progress: true,
        }
    }
}

/// Azure Cosmos DB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosDbConfig {
    /// Cosmos DB endpoint URL
    #[serde(default)]
    pub endpoint: String,

    /// Cosmos DB master key (base64)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default = "empty_secret")]
    pub key: SecretString,

    /// Database name
    #[serde(default)]
    pub database_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Retries for throttled (429) requests
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl CosmosDbConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.endpoint.is_empty() {
            return Err("cosmosdb.endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err("cosmosdb.endpoint must start with https:// or http://".to_string());
        }

        if self.key.expose_secret().is_empty() {
            return Err("cosmosdb.key cannot be empty".to_string());
        }

        if self.database_name.is_empty() {
            return Err("cosmosdb.database_name cannot be empty".to_string());
        }

        if self.request_timeout_seconds == 0 {
            return Err("cosmosdb.request_timeout_seconds must be greater than 0".to_string());
        }

        if self.max_retries > 20 {
            return Err(format!(
                "cosmosdb.max_retries must be <= 20, got {}",
                self.max_retries
            ));
        }

        Ok(())
    }
}

impl Default for CosmosDbConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: empty_secret(),
            database_name: String::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory under which the run folder is created
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output encoding (json or jsonl)
    #[serde(default)]
    pub encoding: Encoding,

    /// Rotate output files above this size (GiB, fractional allowed)
    #[serde(default)]
    pub max_file_size_gb: Option<f64>,

    /// Only export these collections (empty = all)
    #[serde(default)]
    pub collections: Vec<String>,

    /// Batches buffered between fetchers and the writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(size) = self.max_file_size_gb {
            if size <= 0.0 || !size.is_finite() {
                return Err(format!(
                    "export.max_file_size_gb must be a positive number, got {size}"
                ));
            }
        }

        if self.queue_capacity == 0 {
            return Err("export.queue_capacity must be at least 1".to_string());
        }

        Ok(())
    }

    /// Rotation threshold in bytes
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        self.max_file_size_gb
            .map(|gb| ((gb * BYTES_PER_GB).round() as u64).max(1))
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            encoding: Encoding::default(),
            max_file_size_gb: None,
            collections: Vec::new(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Import settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// File or directory to import
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum concurrent upserts
    #[serde(default = "default_import_concurrency")]
    pub concurrency: usize,

    /// Extra scheduled-but-not-started upserts allowed beyond `concurrency`,
    /// shared by all destination groups of a run
    #[serde(default = "default_scheduling_headroom")]
    pub scheduling_headroom: usize,

    /// Approximately shuffle items before upserting
    #[serde(default)]
    pub shuffle: bool,

    /// Reservoir size used when shuffling
    #[serde(default = "default_shuffle_capacity")]
    pub shuffle_capacity: usize,

    /// Destination collections imported concurrently; they share the
    /// upsert limits above
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Only import files exported from this collection
    #[serde(default)]
    pub source_collection: Option<String>,

    /// Import into this collection instead of the source name
    #[serde(default)]
    pub destination_collection: Option<String>,

    /// Partition key path for collections the import creates
    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,
}

impl ImportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 || self.concurrency > 1000 {
            return Err(format!(
                "import.concurrency must be between 1 and 1000, got {}",
                self.concurrency
            ));
        }

        if self.shuffle_capacity == 0 {
            return Err("import.shuffle_capacity must be at least 1".to_string());
        }

        if self.workers == 0 {
            return Err("import.workers must be at least 1".to_string());
        }

        if !self.partition_key_path.starts_with('/') || self.partition_key_path.len() < 2 {
            return Err(format!(
                "import.partition_key_path must look like '/field', got '{}'",
                self.partition_key_path
            ));
        }

        Ok(())
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            path: None,
            concurrency: default_import_concurrency(),
            scheduling_headroom: default_scheduling_headroom(),
            shuffle: false,
            shuffle_capacity: default_shuffle_capacity(),
            workers: default_workers(),
            source_collection: None,
            destination_collection: None,
            partition_key_path: default_partition_key_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to a rolling file
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled = true".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn empty_secret() -> SecretString {
    secret_string(String::new())
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_max_retries() -> usize {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("export")
}

fn default_queue_capacity() -> usize {
    100
}

fn default_import_concurrency() -> usize {
    100
}

fn default_scheduling_headroom() -> usize {
    20
}

fn default_shuffle_capacity() -> usize {
    5000
}

fn default_workers() -> usize {
    1
}

fn default_partition_key_path() -> String {
    DEFAULT_PARTITION_KEY_PATH.to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
