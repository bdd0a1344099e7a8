//! CLI command implementations
//!
//! Every command returns the process exit code:
//! 0 success, 1 completed with failures, 2 configuration error,
//! 4 connection error, 5 fatal error.

pub mod export;
pub mod import;
pub mod validate;

/// Run completed without failures
pub const EXIT_SUCCESS: i32 = 0;

/// Run completed but some collections, files or items failed
pub const EXIT_PARTIAL: i32 = 1;

/// Configuration missing or invalid
pub const EXIT_CONFIG: i32 = 2;

/// Store could not be reached or rejected the key
pub const EXIT_CONNECTION: i32 = 4;

/// Anything else that aborted the run
pub const EXIT_FATAL: i32 = 5;
