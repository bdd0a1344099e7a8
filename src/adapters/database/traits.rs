//! Document store abstraction
//!
//! This module defines the trait a document store must implement to be
//! exported from or imported into. Every remote operation returns a
//! [`StoreResponse`] carrying the request charge of that round trip.

use crate::domain::{CollectionDescriptor, IndexingPolicy, Item, PartitionRange, Result};
use async_trait::async_trait;

/// Value returned by a store operation together with its cost
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<T> {
    /// Operation result
    pub body: T,

    /// Request units charged for the round trip(s)
    pub request_charge: f64,
}

impl<T> StoreResponse<T> {
    /// Wrap a value with its request charge
    pub fn new(body: T, request_charge: f64) -> Self {
        Self {
            body,
            request_charge,
        }
    }

    /// Transform the body, keeping the charge
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StoreResponse<U> {
        StoreResponse {
            body: f(self.body),
            request_charge: self.request_charge,
        }
    }
}

/// One page of a range-scoped query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items in store order
    pub items: Vec<Item>,

    /// Token for the next page, `None` once the range is exhausted
    pub continuation: Option<String>,
}

/// Document store client
///
/// The store owns query execution, partitioning and consistency; callers
/// only drive paging and writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Test that the store is reachable and the credentials are accepted
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    async fn test_connection(&self) -> Result<()>;

    /// List every collection in the database
    async fn list_collections(&self) -> Result<StoreResponse<Vec<CollectionDescriptor>>>;

    /// Enumerate the partition ranges of a collection
    ///
    /// The ranges are disjoint and together cover the whole keyspace.
    async fn partition_ranges(&self, collection: &str)
        -> Result<StoreResponse<Vec<PartitionRange>>>;

    /// Fetch the next page of a range, unbounded page size
    ///
    /// # Arguments
    ///
    /// * `collection` - Collection to scan
    /// * `range` - Partition range the query is restricted to
    /// * `continuation` - Token from the previous page, `None` for the first
    async fn query_page(
        &self,
        collection: &str,
        range: &PartitionRange,
        continuation: Option<&str>,
    ) -> Result<StoreResponse<Page>>;

    /// Create or replace a single item
    ///
    /// The partition key value is read from the item using the collection's
    /// partition key path.
    async fn upsert_item(
        &self,
        collection: &CollectionDescriptor,
        item: &Item,
    ) -> Result<StoreResponse<()>>;

    /// Read a collection's properties, `None` if it does not exist
    async fn read_collection(
        &self,
        name: &str,
    ) -> Result<StoreResponse<Option<CollectionDescriptor>>>;

    /// Create a collection unless one with the same name exists
    ///
    /// Returns `true` when the collection was created by this call.
    async fn create_collection_if_absent(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<StoreResponse<bool>>;

    /// Replace the indexing policy of an existing collection
    async fn replace_indexing_policy(
        &self,
        collection: &CollectionDescriptor,
        policy: &IndexingPolicy,
    ) -> Result<StoreResponse<()>>;

    /// Get the database name
    fn database_name(&self) -> &str;
}
