//! Error types
//!
//! [`DumpError`] is what every fallible operation in the crate returns.
//! HTTP and file-system errors are converted to strings at the boundary so
//! no third-party error type leaks through the public API.

use thiserror::Error;

/// Crate-wide error
#[derive(Debug, Error)]
pub enum DumpError {
    /// Missing or invalid settings, bad CLI input, unreadable import path
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cosmos DB error: {0}")]
    CosmosDb(#[from] CosmosDbError),

    /// Failure of a store that is not the Cosmos DB REST client
    #[error("Store error: {0}")]
    Store(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Import error: {0}")]
    Import(String),

    /// A record that is not a usable item (for example, not a JSON object)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),

    /// A failed store call whose round trips were still billed
    #[error("{error}")]
    Charged {
        error: Box<DumpError>,
        request_charge: f64,
    },
}

impl DumpError {
    /// Whether the store handle itself is unusable
    ///
    /// Fatal errors abort the run; the rest stay inside a collection, file
    /// or item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            DumpError::Authentication(_)
                | DumpError::Connection(_)
                | DumpError::CosmosDb(CosmosDbError::ConnectionFailed(_))
                | DumpError::CosmosDb(CosmosDbError::AuthenticationFailed(_))
        )
    }
}

impl DumpError {
    /// Attach the charge of the round trips that led to this error
    ///
    /// Charges accumulate when an error is charged more than once.
    pub fn with_charge(self, request_charge: f64) -> Self {
        if request_charge <= 0.0 {
            return self;
        }
        match self {
            DumpError::Charged {
                error,
                request_charge: earlier,
            } => DumpError::Charged {
                error,
                request_charge: earlier + request_charge,
            },
            error => DumpError::Charged {
                error: Box::new(error),
                request_charge,
            },
        }
    }

    /// Request charge billed before the failure, zero if none
    pub fn request_charge(&self) -> f64 {
        match self {
            DumpError::Charged { request_charge, .. } => *request_charge,
            _ => 0.0,
        }
    }

    /// The underlying error without its charge
    pub fn root(&self) -> &DumpError {
        match self {
            DumpError::Charged { error, .. } => error.root(),
            error => error,
        }
    }
}

/// Failures reported by the Cosmos DB REST API
#[derive(Debug, Error)]
pub enum CosmosDbError {
    /// Transport failure or unreachable endpoint
    #[error("Cannot reach Cosmos DB: {0}")]
    ConnectionFailed(String),

    /// 401 or 403, usually a wrong master key or clock skew
    #[error("Request rejected by Cosmos DB (auth): {0}")]
    AuthenticationFailed(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Cannot create collection: {0}")]
    CollectionCreationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Upsert failed: {0}")]
    UpsertFailed(String),

    #[error("Indexing policy update failed: {0}")]
    PolicyUpdateFailed(String),

    /// 429 that outlived the retry budget
    #[error("Still throttled after retries (429): {0}")]
    Throttled(String),

    #[error("Bad request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response body: {0}")]
    DeserializationFailed(String),
}

impl From<std::io::Error> for DumpError {
    fn from(err: std::io::Error) -> Self {
        DumpError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DumpError {
    fn from(err: serde_json::Error) -> Self {
        DumpError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DumpError {
    fn from(err: toml::de::Error) -> Self {
        DumpError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_the_resource() {
        let err = DumpError::from(CosmosDbError::CollectionNotFound("orders".to_string()));
        assert_eq!(err.to_string(), "Cosmos DB error: Collection not found: orders");
        assert_eq!(
            DumpError::Configuration("import path missing".to_string()).to_string(),
            "Configuration error: import path missing"
        );
    }

    #[test]
    fn test_only_handle_failures_are_fatal() {
        assert!(DumpError::Connection("refused".to_string()).is_fatal());
        assert!(
            DumpError::CosmosDb(CosmosDbError::AuthenticationFailed("401".to_string())).is_fatal()
        );
        assert!(!DumpError::CosmosDb(CosmosDbError::Throttled("3 retries".to_string())).is_fatal());
        assert!(!DumpError::CosmosDb(CosmosDbError::UpsertFailed("400".to_string())).is_fatal());
        assert!(!DumpError::Io("disk full".to_string()).is_fatal());
    }

    #[test]
    fn test_charge_survives_wrapping() {
        let err = DumpError::from(CosmosDbError::Throttled("3 retries".to_string()))
            .with_charge(2.5)
            .with_charge(5.0);
        assert_eq!(err.request_charge(), 7.5);
        assert!(matches!(
            err.root(),
            DumpError::CosmosDb(CosmosDbError::Throttled(_))
        ));
        assert_eq!(
            err.to_string(),
            "Cosmos DB error: Still throttled after retries (429): 3 retries"
        );

        let uncharged = DumpError::Io("disk full".to_string()).with_charge(0.0);
        assert!(matches!(uncharged, DumpError::Io(_)));
        assert_eq!(uncharged.request_charge(), 0.0);

        let fatal = DumpError::Connection("refused".to_string()).with_charge(1.0);
        assert!(fatal.is_fatal());
    }

    #[test]
    fn test_library_errors_convert() {
        let io: DumpError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(io, DumpError::Io(_)));

        let json: DumpError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(json, DumpError::Serialization(_)));

        let toml: DumpError = toml::from_str::<toml::Value>("a = = b").unwrap_err().into();
        assert!(toml.to_string().contains("TOML parse error"));
    }
}
