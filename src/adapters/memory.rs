//! In-memory document store
//!
//! A [`DocumentStore`] backed by process memory. Collections are split into
//! fixed partitions so range-parallel export can be exercised, and faults can
//! be injected per item, per range or for policy reads. Injected faults are
//! billed like rejected requests on a real account. Upserts check the
//! partition key path against the stored collection and record how many
//! calls were in flight at once.

use crate::adapters::database::{DocumentStore, Page, StoreResponse};
use crate::domain::{
    CollectionDescriptor, CosmosDbError, DumpError, IndexingPolicy, Item, PartitionRange, Result,
};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Charge of a metadata call (list, read, create, replace)
pub const METADATA_CHARGE: f64 = 1.0;

/// Charge of one query page
pub const QUERY_PAGE_CHARGE: f64 = 2.5;

/// Charge of one upsert
pub const UPSERT_CHARGE: f64 = 5.0;

/// Charge of a request rejected by an injected fault
pub const REJECTED_CHARGE: f64 = 0.5;

/// Partitions given to collections created through the store API
const CREATED_PARTITIONS: usize = 4;

const DEFAULT_PAGE_SIZE: usize = 100;

struct StoredCollection {
    descriptor: CollectionDescriptor,
    partitions: Vec<Vec<Item>>,
}

#[derive(Default)]
struct StoreState {
    collections: BTreeMap<String, StoredCollection>,
    policy_history: Vec<(String, IndexingPolicy)>,
    failing_upserts: HashSet<String>,
    failing_ranges: HashSet<(String, String)>,
}

/// In-memory [`DocumentStore`]
pub struct InMemoryStore {
    database: String,
    page_size: usize,
    upsert_delay: Option<Duration>,
    state: Mutex<StoreState>,
    unreachable: AtomicBool,
    /// Remaining `read_collection` failures, `usize::MAX` for all of them
    policy_read_failures: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl InMemoryStore {
    /// Create an empty store for `database`
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            page_size: DEFAULT_PAGE_SIZE,
            upsert_delay: None,
            state: Mutex::new(StoreState::default()),
            unreachable: AtomicBool::new(false),
            policy_read_failures: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    /// Maximum items returned per query page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Hold every upsert for `delay` so concurrent calls overlap
    pub fn with_upsert_delay(mut self, delay: Duration) -> Self {
        self.upsert_delay = Some(delay);
        self
    }

    /// Seed a collection; each inner vector becomes one partition range
    pub fn add_collection(&self, descriptor: CollectionDescriptor, partitions: Vec<Vec<Item>>) {
        let partitions = if partitions.is_empty() {
            vec![Vec::new()]
        } else {
            partitions
        };
        self.lock().collections.insert(
            descriptor.name.clone(),
            StoredCollection {
                descriptor,
                partitions,
            },
        );
    }

    /// Make every call fail as if the account could not be reached
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Reject upserts of the item with this id
    pub fn fail_upserts_for(&self, id: impl Into<String>) {
        self.lock().failing_upserts.insert(id.into());
    }

    /// Fail queries against one partition range
    pub fn fail_range(&self, collection: impl Into<String>, range: impl Into<String>) {
        self.lock()
            .failing_ranges
            .insert((collection.into(), range.into()));
    }

    /// Fail every `read_collection` call
    pub fn set_fail_policy_reads(&self, fail: bool) {
        let failures = if fail { usize::MAX } else { 0 };
        self.policy_read_failures.store(failures, Ordering::SeqCst);
    }

    /// Fail only the next `count` `read_collection` calls
    pub fn fail_next_policy_reads(&self, count: usize) {
        self.policy_read_failures.store(count, Ordering::SeqCst);
    }

    fn take_policy_read_failure(&self) -> bool {
        self.policy_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }

    /// All items of a collection, partition by partition
    pub fn items(&self, collection: &str) -> Vec<Item> {
        self.lock()
            .collections
            .get(collection)
            .map(|c| c.partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of items in a collection
    pub fn item_count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(|c| c.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Current indexing policy of a collection
    pub fn indexing_policy(&self, collection: &str) -> Option<IndexingPolicy> {
        self.lock()
            .collections
            .get(collection)
            .map(|c| c.descriptor.indexing_policy.clone())
    }

    /// Every policy written to a collection, oldest first
    pub fn policy_history(&self, collection: &str) -> Vec<IndexingPolicy> {
        self.lock()
            .policy_history
            .iter()
            .filter(|(name, _)| name == collection)
            .map(|(_, policy)| policy.clone())
            .collect()
    }

    /// Highest number of upserts observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Total upsert calls, including failed ones
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DumpError::CosmosDb(CosmosDbError::ConnectionFailed(
                "in-memory store marked unreachable".to_string(),
            )));
        }
        Ok(())
    }

    fn apply_upsert(&self, collection: &CollectionDescriptor, item: &Item) -> Result<()> {
        let id = item.id().ok_or_else(|| {
            CosmosDbError::InvalidRequest("document is missing a string 'id'".to_string())
        })?;

        let mut state = self.lock();
        if state.failing_upserts.contains(id) {
            return Err(
                DumpError::from(CosmosDbError::UpsertFailed(format!(
                    "injected failure for {id}"
                )))
                .with_charge(REJECTED_CHARGE),
            );
        }

        let stored = state
            .collections
            .get_mut(&collection.name)
            .ok_or_else(|| CosmosDbError::CollectionNotFound(collection.name.clone()))?;
        if stored.descriptor.partition_key_path != collection.partition_key_path {
            return Err(DumpError::from(CosmosDbError::InvalidRequest(format!(
                "partition key {} does not match {} of collection {}",
                collection.partition_key_path,
                stored.descriptor.partition_key_path,
                collection.name
            )))
            .with_charge(REJECTED_CHARGE));
        }

        for partition in stored.partitions.iter_mut() {
            if let Some(existing) = partition.iter_mut().find(|i| i.id() == Some(id)) {
                *existing = item.clone();
                return Ok(());
            }
        }

        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let index = (hasher.finish() % stored.partitions.len() as u64) as usize;
        stored.partitions[index].push(item.clone());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn test_connection(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn list_collections(&self) -> Result<StoreResponse<Vec<CollectionDescriptor>>> {
        self.check_reachable()?;
        let descriptors = self
            .lock()
            .collections
            .values()
            .map(|c| c.descriptor.clone())
            .collect();
        Ok(StoreResponse::new(descriptors, METADATA_CHARGE))
    }

    async fn partition_ranges(
        &self,
        collection: &str,
    ) -> Result<StoreResponse<Vec<PartitionRange>>> {
        self.check_reachable()?;
        let state = self.lock();
        let stored = state
            .collections
            .get(collection)
            .ok_or_else(|| CosmosDbError::CollectionNotFound(collection.to_string()))?;
        let ranges = (0..stored.partitions.len())
            .map(|i| PartitionRange::new(i.to_string()))
            .collect();
        Ok(StoreResponse::new(ranges, METADATA_CHARGE))
    }

    async fn query_page(
        &self,
        collection: &str,
        range: &PartitionRange,
        continuation: Option<&str>,
    ) -> Result<StoreResponse<Page>> {
        self.check_reachable()?;
        tokio::task::yield_now().await;

        let state = self.lock();
        if state
            .failing_ranges
            .contains(&(collection.to_string(), range.as_str().to_string()))
        {
            return Err(DumpError::from(CosmosDbError::QueryFailed(format!(
                "injected failure for {collection} range {range}"
            )))
            .with_charge(REJECTED_CHARGE));
        }

        let stored = state
            .collections
            .get(collection)
            .ok_or_else(|| CosmosDbError::CollectionNotFound(collection.to_string()))?;
        let partition = range
            .as_str()
            .parse::<usize>()
            .ok()
            .and_then(|i| stored.partitions.get(i))
            .ok_or_else(|| {
                CosmosDbError::InvalidRequest(format!("unknown partition range {range}"))
            })?;

        let offset = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| {
                CosmosDbError::InvalidRequest(format!("malformed continuation {token}"))
            })?,
            None => 0,
        };

        let end = (offset + self.page_size).min(partition.len());
        let items = partition
            .get(offset..end)
            .map(<[Item]>::to_vec)
            .unwrap_or_default();
        let continuation = (end < partition.len()).then(|| end.to_string());

        Ok(StoreResponse::new(
            Page {
                items,
                continuation,
            },
            QUERY_PAGE_CHARGE,
        ))
    }

    async fn upsert_item(
        &self,
        collection: &CollectionDescriptor,
        item: &Item,
    ) -> Result<StoreResponse<()>> {
        self.check_reachable()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        match self.upsert_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let result = self.apply_upsert(collection, item);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result.map(|()| StoreResponse::new((), UPSERT_CHARGE))
    }

    async fn read_collection(
        &self,
        name: &str,
    ) -> Result<StoreResponse<Option<CollectionDescriptor>>> {
        self.check_reachable()?;
        if self.take_policy_read_failure() {
            return Err(DumpError::from(CosmosDbError::QueryFailed(format!(
                "injected read failure for {name}"
            )))
            .with_charge(REJECTED_CHARGE));
        }

        let descriptor = self
            .lock()
            .collections
            .get(name)
            .map(|c| c.descriptor.clone());
        Ok(StoreResponse::new(descriptor, METADATA_CHARGE))
    }

    async fn create_collection_if_absent(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<StoreResponse<bool>> {
        self.check_reachable()?;
        let mut state = self.lock();
        if state.collections.contains_key(&descriptor.name) {
            return Ok(StoreResponse::new(false, METADATA_CHARGE));
        }

        state.collections.insert(
            descriptor.name.clone(),
            StoredCollection {
                descriptor: descriptor.clone(),
                partitions: vec![Vec::new(); CREATED_PARTITIONS],
            },
        );
        Ok(StoreResponse::new(true, METADATA_CHARGE))
    }

    async fn replace_indexing_policy(
        &self,
        collection: &CollectionDescriptor,
        policy: &IndexingPolicy,
    ) -> Result<StoreResponse<()>> {
        self.check_reachable()?;
        let mut state = self.lock();
        let stored = state
            .collections
            .get_mut(&collection.name)
            .ok_or_else(|| CosmosDbError::CollectionNotFound(collection.name.clone()))?;
        stored.descriptor.indexing_policy = policy.clone();
        state
            .policy_history
            .push((collection.name.clone(), policy.clone()));
        Ok(StoreResponse::new((), METADATA_CHARGE))
    }

    fn database_name(&self) -> &str {
        &self.database
    }
}
