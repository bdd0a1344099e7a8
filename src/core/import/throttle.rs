//! Upsert throttler
//!
//! Two counting gates bound the write side of an import, and both are shared
//! by every file of a run. The in-flight gate caps concurrent upserts at N.
//! The scheduling gate caps upserts scheduled but not yet finished at N plus
//! some headroom, which keeps pending work bounded while parsers run ahead,
//! however many destinations are imported at once.

use crate::adapters::database::DocumentStore;
use crate::core::cost::ScopedCost;
use crate::core::progress::ProgressReporter;
use crate::domain::{CollectionDescriptor, Item};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default extra scheduled upserts allowed beyond the in-flight limit
pub const DEFAULT_SCHEDULING_HEADROOM: usize = 20;

/// Imported and failed item counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub imported: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Tally {
    imported: AtomicU64,
    failed: AtomicU64,
}

/// Run-wide admission gate for upserts
#[derive(Clone)]
pub struct UpsertThrottler {
    store: Arc<dyn DocumentStore>,
    in_flight: Arc<Semaphore>,
    scheduled: Arc<Semaphore>,
    limit: usize,
    capacity: usize,
}

impl UpsertThrottler {
    /// Create a throttler allowing `limit` concurrent upserts
    pub fn new(store: Arc<dyn DocumentStore>, limit: usize, headroom: usize) -> Self {
        let limit = limit.max(1);
        let capacity = limit + headroom;
        Self {
            store,
            in_flight: Arc::new(Semaphore::new(limit)),
            scheduled: Arc::new(Semaphore::new(capacity)),
            limit,
            capacity,
        }
    }

    /// Maximum concurrent upserts
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Upserts currently holding an in-flight slot
    pub fn in_flight(&self) -> usize {
        self.limit - self.in_flight.available_permits()
    }

    /// Upserts scheduled and not yet finished, across all sessions
    pub fn scheduled(&self) -> usize {
        self.capacity - self.scheduled.available_permits()
    }

    /// Start a session writing into `collection`
    pub fn session(
        &self,
        collection: CollectionDescriptor,
        cost: ScopedCost,
        progress: Arc<ProgressReporter>,
    ) -> UpsertSession {
        UpsertSession {
            throttler: self.clone(),
            collection: Arc::new(collection),
            cost,
            progress,
            pending: Arc::new(Semaphore::new(self.capacity)),
            tally: Arc::new(Tally::default()),
        }
    }
}

/// Upserts of one file into one collection
pub struct UpsertSession {
    throttler: UpsertThrottler,
    collection: Arc<CollectionDescriptor>,
    cost: ScopedCost,
    progress: Arc<ProgressReporter>,
    /// One permit per unfinished upsert of this session; never contended,
    /// since every holder also holds a run-wide scheduling permit
    pending: Arc<Semaphore>,
    tally: Arc<Tally>,
}

impl UpsertSession {
    /// Schedule an upsert of `item`
    ///
    /// Waits while the run already has its maximum of scheduled upserts.
    /// The outcome and its charge are recorded when the upsert finishes; a
    /// failure is logged and never stops the session.
    pub async fn submit(&self, item: Item) {
        let Ok(scheduled) = Arc::clone(&self.throttler.scheduled).acquire_owned().await else {
            self.record_failure("scheduling gate closed");
            return;
        };
        let Ok(pending) = Arc::clone(&self.pending).acquire_owned().await else {
            self.record_failure("session already finished");
            return;
        };

        let store = Arc::clone(&self.throttler.store);
        let in_flight = Arc::clone(&self.throttler.in_flight);
        let collection = Arc::clone(&self.collection);
        let cost = self.cost.clone();
        let progress = Arc::clone(&self.progress);
        let tally = Arc::clone(&self.tally);

        tokio::spawn(async move {
            let _scheduled = (scheduled, pending);
            let Ok(_slot) = in_flight.acquire_owned().await else {
                tally.failed.fetch_add(1, Ordering::Relaxed);
                return;
            };

            match store.upsert_item(&collection, &item).await {
                Ok(response) => {
                    cost.record(response.request_charge);
                    tally.imported.fetch_add(1, Ordering::Relaxed);
                    progress.add_items(1);
                }
                Err(e) => {
                    cost.record(e.request_charge());
                    tally.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        collection = %collection.name,
                        id = item.id().unwrap_or("<missing>"),
                        request_charge = e.request_charge(),
                        error = %e,
                        "Upsert failed"
                    );
                }
            }
        });
    }

    /// Count an item that never reached the store
    pub fn record_failure(&self, reason: &str) {
        self.tally.failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(collection = %self.collection.name, reason, "Item skipped");
    }

    /// Counts so far; upserts still running are not included
    pub fn counts(&self) -> UpsertCounts {
        UpsertCounts {
            imported: self.tally.imported.load(Ordering::Relaxed),
            failed: self.tally.failed.load(Ordering::Relaxed),
        }
    }

    /// Wait for every scheduled upsert to finish and return the final counts
    pub async fn finish(self) -> UpsertCounts {
        // Every task holds one pending permit until it completes
        let capacity = self.throttler.capacity as u32;
        let _drained = self.pending.acquire_many(capacity).await;
        self.counts()
    }
}
