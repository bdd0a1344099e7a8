//! Result alias used across the crate

use super::errors::DumpError;

/// Result of any store, file or pipeline operation
///
/// ```
/// use cosmos_dump::domain::{DumpError, Result};
///
/// fn require_database(name: &str) -> Result<&str> {
///     if name.is_empty() {
///         return Err(DumpError::Configuration("database name is empty".to_string()));
///     }
///     Ok(name)
/// }
///
/// assert!(require_database("").is_err());
/// ```
pub type Result<T> = std::result::Result<T, DumpError>;
