//! Errors recorded in run summaries
//!
//! Failures below the run level (a collection, a file, an item) are caught
//! by the orchestrators and kept here instead of being propagated.

use crate::domain::{CosmosDbError, DumpError};

/// Type of transfer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// Store unreachable
    Connection,
    /// Key rejected
    Authentication,
    /// Listing, range enumeration or page fetch
    Query,
    /// Upsert or collection creation
    Storage,
    /// Indexing policy capture or restore
    Indexing,
    /// Malformed input file
    Parse,
    /// Local file system
    Io,
    /// Configuration or filters
    Configuration,
    /// Anything else
    Unknown,
}

impl TransferErrorKind {
    /// Classify a domain error
    pub fn classify(error: &DumpError) -> Self {
        match error.root() {
            DumpError::Connection(_) | DumpError::CosmosDb(CosmosDbError::ConnectionFailed(_)) => {
                TransferErrorKind::Connection
            }
            DumpError::Authentication(_)
            | DumpError::CosmosDb(CosmosDbError::AuthenticationFailed(_)) => {
                TransferErrorKind::Authentication
            }
            DumpError::CosmosDb(CosmosDbError::UpsertFailed(_))
            | DumpError::CosmosDb(CosmosDbError::CollectionCreationFailed(_)) => {
                TransferErrorKind::Storage
            }
            DumpError::CosmosDb(CosmosDbError::PolicyUpdateFailed(_)) => {
                TransferErrorKind::Indexing
            }
            DumpError::CosmosDb(_) | DumpError::Store(_) => TransferErrorKind::Query,
            DumpError::Serialization(_) | DumpError::Validation(_) => TransferErrorKind::Parse,
            DumpError::Io(_) => TransferErrorKind::Io,
            DumpError::Configuration(_) => TransferErrorKind::Configuration,
            DumpError::Export(_)
            | DumpError::Import(_)
            | DumpError::Other(_)
            | DumpError::Charged { .. } => TransferErrorKind::Unknown,
        }
    }
}

/// Error with context
#[derive(Debug, Clone)]
pub struct TransferError {
    /// Type of error
    pub kind: TransferErrorKind,

    /// Error message
    pub message: String,

    /// Collection, file or item the error belongs to
    pub context: Option<String>,
}

impl TransferError {
    /// Create a new transfer error
    pub fn new(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Build from a domain error, classifying it
    pub fn from_error(error: &DumpError) -> Self {
        Self::new(TransferErrorKind::classify(error), error.to_string())
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let upsert = DumpError::CosmosDb(CosmosDbError::UpsertFailed("x".into()));
        assert_eq!(TransferErrorKind::classify(&upsert), TransferErrorKind::Storage);

        let query = DumpError::CosmosDb(CosmosDbError::QueryFailed("x".into()));
        assert_eq!(TransferErrorKind::classify(&query), TransferErrorKind::Query);

        let io = DumpError::Io("disk full".into());
        assert_eq!(TransferErrorKind::classify(&io), TransferErrorKind::Io);
    }

    #[test]
    fn test_transfer_error_with_context() {
        let error = TransferError::new(TransferErrorKind::Parse, "bad json")
            .with_context("orders_export.json");

        assert_eq!(error.kind, TransferErrorKind::Parse);
        assert_eq!(error.message, "bad json");
        assert_eq!(error.context.as_deref(), Some("orders_export.json"));
    }
}
