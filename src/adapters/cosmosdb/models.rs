//! Cosmos DB REST resource models
//!
//! Request and response bodies of the REST API, and their conversion into
//! domain types.

use crate::domain::{
    CollectionDescriptor, IndexingPolicy, PartitionRange, DEFAULT_PARTITION_KEY_PATH,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partition key definition of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,

    #[serde(default = "default_partition_kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl PartitionKeyDefinition {
    /// Hash partitioning on a single path
    pub fn hash(path: &str) -> Self {
        Self {
            paths: vec![path.to_string()],
            kind: default_partition_kind(),
            version: None,
        }
    }
}

fn default_partition_kind() -> String {
    "Hash".to_string()
}

/// Collection (container) resource
///
/// Used both as the body of create/replace requests and as the shape of
/// read/list responses; system properties are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResource {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_policy: Option<Value>,
}

impl From<&CollectionDescriptor> for CollectionResource {
    fn from(descriptor: &CollectionDescriptor) -> Self {
        Self {
            id: descriptor.name.clone(),
            partition_key: Some(PartitionKeyDefinition::hash(
                &descriptor.partition_key_path,
            )),
            indexing_policy: Some(descriptor.indexing_policy.as_value().clone()),
        }
    }
}

impl From<CollectionResource> for CollectionDescriptor {
    fn from(resource: CollectionResource) -> Self {
        let partition_key_path = resource
            .partition_key
            .and_then(|pk| pk.paths.into_iter().next())
            .unwrap_or_else(|| DEFAULT_PARTITION_KEY_PATH.to_string());
        let indexing_policy = resource
            .indexing_policy
            .map(IndexingPolicy::new)
            .unwrap_or_default();

        CollectionDescriptor::new(resource.id, partition_key_path, indexing_policy)
    }
}

/// Response of `GET dbs/{db}/colls`
#[derive(Debug, Deserialize)]
pub struct CollectionList {
    #[serde(rename = "DocumentCollections", default)]
    pub collections: Vec<CollectionResource>,
}

/// A single partition key range
#[derive(Debug, Deserialize)]
pub struct PartitionKeyRangeResource {
    pub id: String,
}

/// Response of `GET dbs/{db}/colls/{coll}/pkranges`
#[derive(Debug, Deserialize)]
pub struct PartitionKeyRangeList {
    #[serde(rename = "PartitionKeyRanges", default)]
    pub ranges: Vec<PartitionKeyRangeResource>,
}

impl PartitionKeyRangeList {
    pub fn into_ranges(self) -> Vec<PartitionRange> {
        self.ranges
            .into_iter()
            .map(|r| PartitionRange::new(r.id))
            .collect()
    }
}

/// Response of a document query
#[derive(Debug, Deserialize)]
pub struct DocumentList {
    #[serde(rename = "Documents", default)]
    pub documents: Vec<Value>,
}

/// Body of a SQL query request
#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    pub parameters: Vec<Value>,
}

impl<'a> QueryRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            parameters: Vec::new(),
        }
    }
}
