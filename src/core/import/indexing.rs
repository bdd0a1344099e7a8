//! Indexing lifecycle around a bulk load
//!
//! A missing destination is created with indexing disabled and stays that
//! way. An existing destination has its policy captured and, unless it is
//! already disabled, switched off until every file for it has been imported.
//! Capture and restore failures only produce warnings and leave the
//! collection's indexing as it is. Upserts still need the destination's real
//! partition key, so a destination whose settings cannot be read at all is
//! not imported into.

use crate::adapters::database::DocumentStore;
use crate::core::cost::ScopedCost;
use crate::domain::{CollectionDescriptor, DumpError, IndexingPolicy, Result};
use std::sync::Arc;

/// State held between preparing a collection and finishing its import
#[derive(Debug, Clone)]
pub struct IndexingLifecycle {
    collection: CollectionDescriptor,
    restore: Option<IndexingPolicy>,
    created: bool,
}

impl IndexingLifecycle {
    /// Make `name` ready for a bulk load
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is missing and cannot be created,
    /// or if it exists but its settings cannot be read.
    pub async fn prepare(
        store: &Arc<dyn DocumentStore>,
        name: &str,
        partition_key_path: &str,
        cost: &ScopedCost,
    ) -> Result<Self> {
        let existing = match store.read_collection(name).await {
            Ok(response) => {
                cost.record(response.request_charge);
                response.body
            }
            Err(e) => {
                cost.record(e.request_charge());
                tracing::warn!(
                    collection = %name,
                    error = %e,
                    "Could not read collection settings, indexing left unchanged"
                );
                return Self::create_or_adopt(store, name, partition_key_path, cost).await;
            }
        };

        let Some(collection) = existing else {
            return Self::create_or_adopt(store, name, partition_key_path, cost).await;
        };

        let captured = collection.indexing_policy.clone();
        if captured.is_disabled() {
            tracing::debug!(collection = %name, "Indexing already disabled");
            return Ok(Self {
                collection,
                restore: None,
                created: false,
            });
        }

        let restore = match store
            .replace_indexing_policy(&collection, &IndexingPolicy::disabled())
            .await
        {
            Ok(response) => {
                cost.record(response.request_charge);
                tracing::info!(collection = %name, "Indexing disabled for import");
                Some(captured)
            }
            Err(e) => {
                cost.record(e.request_charge());
                tracing::warn!(
                    collection = %name,
                    error = %e,
                    "Could not disable indexing, importing with current policy"
                );
                None
            }
        };

        Ok(Self {
            collection,
            restore,
            created: false,
        })
    }

    /// Create the collection, or adopt it untouched if it already exists
    async fn create_or_adopt(
        store: &Arc<dyn DocumentStore>,
        name: &str,
        partition_key_path: &str,
        cost: &ScopedCost,
    ) -> Result<Self> {
        let wanted =
            CollectionDescriptor::new(name, partition_key_path, IndexingPolicy::disabled());
        let response = store
            .create_collection_if_absent(&wanted)
            .await
            .map_err(|e| {
                cost.record(e.request_charge());
                e
            })?;
        cost.record(response.request_charge);

        if response.body {
            tracing::info!(
                collection = %name,
                partition_key = %partition_key_path,
                "Created collection with indexing disabled"
            );
            return Ok(Self {
                collection: wanted,
                restore: None,
                created: true,
            });
        }

        // The configured partition key is only a default for new collections
        let existing = store.read_collection(name).await.map_err(|e| {
            cost.record(e.request_charge());
            DumpError::Import(format!(
                "Partition key of existing collection {name} is unknown: {e}"
            ))
        })?;
        cost.record(existing.request_charge);

        let collection = existing.body.ok_or_else(|| {
            DumpError::Import(format!(
                "Collection {name} disappeared while preparing the import"
            ))
        })?;
        tracing::info!(
            collection = %name,
            partition_key = %collection.partition_key_path,
            "Importing into existing collection with its current indexing"
        );

        Ok(Self {
            collection,
            restore: None,
            created: false,
        })
    }

    /// Descriptor the upserts should target
    pub fn collection(&self) -> &CollectionDescriptor {
        &self.collection
    }

    /// Whether this run created the collection
    pub fn created(&self) -> bool {
        self.created
    }

    /// Policy that will be reapplied by [`finish`](Self::finish)
    pub fn pending_restore(&self) -> Option<&IndexingPolicy> {
        self.restore.as_ref()
    }

    /// Reapply the captured policy; returns whether anything was restored
    pub async fn finish(self, store: &Arc<dyn DocumentStore>, cost: &ScopedCost) -> bool {
        let Some(policy) = self.restore else {
            return false;
        };

        match store.replace_indexing_policy(&self.collection, &policy).await {
            Ok(response) => {
                cost.record(response.request_charge);
                tracing::info!(collection = %self.collection.name, "Indexing policy restored");
                true
            }
            Err(e) => {
                cost.record(e.request_charge());
                tracing::warn!(
                    collection = %self.collection.name,
                    error = %e,
                    "Could not restore indexing policy"
                );
                false
            }
        }
    }
}
