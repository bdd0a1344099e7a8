//! Collection metadata: descriptors, indexing policies and partition ranges

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Default partition key path for collections created by an import
pub const DEFAULT_PARTITION_KEY_PATH: &str = "/id";

/// Collection-level indexing configuration
///
/// The policy document is kept verbatim so it can be written back exactly as
/// it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexingPolicy(Value);

impl IndexingPolicy {
    /// Wrap a raw policy document
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Policy with secondary-index maintenance switched off
    pub fn disabled() -> Self {
        Self(json!({
            "indexingMode": "none",
            "automatic": false,
        }))
    }

    /// Default consistent policy indexing every path
    pub fn consistent() -> Self {
        Self(json!({
            "indexingMode": "consistent",
            "automatic": true,
            "includedPaths": [{"path": "/*"}],
            "excludedPaths": [{"path": "/\"_etag\"/?"}],
        }))
    }

    /// Whether index maintenance is off for this policy
    pub fn is_disabled(&self) -> bool {
        self.0
            .get("indexingMode")
            .and_then(Value::as_str)
            .map(|mode| mode.eq_ignore_ascii_case("none"))
            .unwrap_or(false)
    }

    /// The raw policy document
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self::consistent()
    }
}

/// Description of a remote collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    /// Collection name (its identity)
    pub name: String,

    /// Partition key path, e.g. `/tenantId`
    pub partition_key_path: String,

    /// Current indexing policy
    pub indexing_policy: IndexingPolicy,
}

impl CollectionDescriptor {
    /// Create a descriptor
    pub fn new(
        name: impl Into<String>,
        partition_key_path: impl Into<String>,
        indexing_policy: IndexingPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            partition_key_path: partition_key_path.into(),
            indexing_policy,
        }
    }
}

/// Opaque token for one disjoint slice of a collection's keyspace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionRange(String);

impl PartitionRange {
    /// Wrap a range token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
