//! `tracing` subscriber setup
//!
//! Console output is always on; a rolling JSON log file is added when
//! `logging.local_enabled` is set.

use crate::config::LoggingConfig;
use crate::domain::{DumpError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "cosmos-dump.log";

/// HTTP stack crates are capped at `warn`; per-request detail comes from
/// the Cosmos adapter's own spans.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "reqwest=warn", "rustls=warn"];

/// Keeps the file writer alive; dropping it flushes buffered log lines.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber for a run
///
/// `level` is one of trace, debug, info, warn, error. `RUST_LOG` replaces the
/// whole filter when set.
pub fn init_logging(level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(parse_level(level)?);

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter.clone())
        .boxed();

    let (file, file_guard) = if config.local_enabled {
        std::fs::create_dir_all(&config.local_path).map_err(|e| {
            DumpError::Configuration(format!(
                "Cannot create log directory {}: {e}",
                config.local_path
            ))
        })?;
        let appender = RollingFileAppender::new(
            rotation(&config.local_rotation),
            &config.local_path,
            LOG_FILE_PREFIX,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| DumpError::Configuration(format!("Logging already initialized: {e}")))?;

    tracing::debug!(
        file_logging = config.local_enabled,
        path = %config.local_path,
        rotation = %config.local_rotation,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(level: Level) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    QUIET_DEPENDENCIES
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::new(level.as_str()), EnvFilter::add_directive)
}

fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn parse_level(level: &str) -> Result<Level> {
    level.trim().parse::<Level>().map_err(|_| {
        DumpError::Configuration(format!(
            "Invalid log level '{level}' (expected trace, debug, info, warn or error)"
        ))
    })
}
