//! Partition fetcher: pages one partition range into the export queue

use crate::adapters::database::DocumentStore;
use crate::core::cost::ScopedCost;
use crate::core::export::writer::WriterMessage;
use crate::core::progress::ProgressReporter;
use crate::domain::PartitionRange;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of one fetcher
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Range that was scanned
    pub range: PartitionRange,

    /// Items queued for the writer
    pub items: u64,

    /// Query round trips made
    pub pages: u64,

    /// Error that stopped the scan early, if any
    pub error: Option<String>,
}

/// Scans one partition range and feeds its pages to the writer
pub struct PartitionFetcher {
    store: Arc<dyn DocumentStore>,
    collection: String,
    range: PartitionRange,
    sender: mpsc::Sender<WriterMessage>,
    cost: ScopedCost,
    progress: Arc<ProgressReporter>,
}

impl PartitionFetcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        range: PartitionRange,
        sender: mpsc::Sender<WriterMessage>,
        cost: ScopedCost,
        progress: Arc<ProgressReporter>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            range,
            sender,
            cost,
            progress,
        }
    }

    /// Page through the range until it is exhausted
    ///
    /// Sending blocks while the queue is full. Errors are logged and end the
    /// scan; nothing is retried here.
    pub async fn run(self) -> FetchReport {
        let mut report = FetchReport {
            range: self.range.clone(),
            items: 0,
            pages: 0,
            error: None,
        };
        let mut continuation: Option<String> = None;

        loop {
            let response = match self
                .store
                .query_page(&self.collection, &self.range, continuation.as_deref())
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.cost.record(e.request_charge());
                    tracing::error!(
                        collection = %self.collection,
                        range = %self.range,
                        pages = report.pages,
                        error = %e,
                        "Partition fetch failed"
                    );
                    report.error = Some(e.to_string());
                    return report;
                }
            };

            self.cost.record(response.request_charge);
            report.pages += 1;

            let page = response.body;
            let count = page.items.len() as u64;
            if count > 0 {
                if self.sender.send(WriterMessage::Batch(page.items)).await.is_err() {
                    let message = "writer stopped before the range was drained".to_string();
                    tracing::warn!(
                        collection = %self.collection,
                        range = %self.range,
                        "{message}"
                    );
                    report.error = Some(message);
                    return report;
                }
                report.items += count;
                self.progress.add_items(count);
            }

            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            collection = %self.collection,
            range = %self.range,
            items = report.items,
            pages = report.pages,
            "Partition range exhausted"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryStore, QUERY_PAGE_CHARGE, REJECTED_CHARGE};
    use crate::core::cost::CostMeter;
    use crate::domain::{CollectionDescriptor, IndexingPolicy, Item};
    use serde_json::json;

    fn seeded_store(page_size: usize) -> Arc<InMemoryStore> {
        let store = InMemoryStore::new("appdb").with_page_size(page_size);
        let items = (0..5)
            .map(|i| Item::try_from(json!({"id": i.to_string()})).unwrap())
            .collect();
        store.add_collection(
            CollectionDescriptor::new("orders", "/id", IndexingPolicy::consistent()),
            vec![items],
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_fetcher_pages_in_order() {
        let store = seeded_store(2);
        let meter = CostMeter::new();
        let (tx, mut rx) = mpsc::channel(10);

        let fetcher = PartitionFetcher::new(
            store,
            "orders",
            PartitionRange::new("0"),
            tx,
            meter.scope("orders"),
            Arc::new(ProgressReporter::hidden(meter.clone())),
        );
        let report = fetcher.run().await;

        assert_eq!(report.items, 5);
        assert_eq!(report.pages, 3);
        assert!(report.error.is_none());
        assert_eq!(meter.collection_total("orders"), 3.0 * QUERY_PAGE_CHARGE);

        let mut ids = Vec::new();
        while let Some(WriterMessage::Batch(items)) = rx.recv().await {
            ids.extend(items.iter().map(|i| i.id().unwrap().to_string()));
        }
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_fetcher_stops_on_error() {
        let store = seeded_store(2);
        store.fail_range("orders", "0");
        let meter = CostMeter::new();
        let (tx, _rx) = mpsc::channel(10);

        let report = PartitionFetcher::new(
            store,
            "orders",
            PartitionRange::new("0"),
            tx,
            meter.scope("orders"),
            Arc::new(ProgressReporter::hidden(meter.clone())),
        )
        .run()
        .await;

        assert_eq!(report.items, 0);
        assert!(report.error.is_some());
        assert_eq!(meter.collection_total("orders"), REJECTED_CHARGE);
    }

    #[tokio::test]
    async fn test_fetcher_stops_when_writer_is_gone() {
        let store = seeded_store(1);
        let meter = CostMeter::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let report = PartitionFetcher::new(
            store,
            "orders",
            PartitionRange::new("0"),
            tx,
            meter.scope("orders"),
            Arc::new(ProgressReporter::hidden(meter.clone())),
        )
        .run()
        .await;

        assert_eq!(report.pages, 1);
        assert!(report.error.is_some());
    }
}
