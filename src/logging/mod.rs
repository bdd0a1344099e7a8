//! Logging for export and import runs
//!
//! Console output goes to stderr so it never interleaves with the summary
//! printed on stdout. A rolling JSON log file can be enabled in the
//! `[logging]` section; `RUST_LOG` overrides the configured level.
//!
//! ```no_run
//! use cosmos_dump::config::LoggingConfig;
//! use cosmos_dump::logging::init_logging;
//!
//! let _guard = init_logging("info", &LoggingConfig::default()).expect("logging");
//! tracing::info!(collection = "orders", "Starting export");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a failure that abandoned one collection or destination group
///
/// ```no_run
/// use cosmos_dump::domain::DumpError;
/// use cosmos_dump::log_collection_failure;
///
/// let error = DumpError::Store("partition ranges unavailable".to_string());
/// log_collection_failure!("orders", &error, "Export of collection failed");
/// ```
#[macro_export]
macro_rules! log_collection_failure {
    ($collection:expr, $error:expr, $message:literal) => {
        tracing::error!(
            collection = %$collection,
            error = %$error,
            fatal = $error.is_fatal(),
            $message
        );
    };
}

/// Log a throttled request that is about to be retried
#[macro_export]
macro_rules! log_throttled_retry {
    ($path:expr, $attempt:expr, $max_retries:expr, $wait_ms:expr) => {
        tracing::warn!(
            path = %$path,
            attempt = $attempt,
            max_retries = $max_retries,
            wait_ms = $wait_ms,
            "Request rate too large, backing off"
        );
    };
}
