//! Integration tests for the export pipeline against the in-memory store

use cosmos_dump::adapters::memory::InMemoryStore;
use cosmos_dump::config::ExportConfig;
use cosmos_dump::core::export::ExportCoordinator;
use cosmos_dump::domain::{CollectionDescriptor, Encoding, IndexingPolicy, Item};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn items(prefix: &str, count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| {
            Item::try_from(json!({
                "id": format!("{prefix}-{i}"),
                "customer": {"name": format!("customer {i}"), "tier": i % 3},
                "total": i as f64 * 1.5,
            }))
            .unwrap()
        })
        .collect()
}

fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new("appdb").with_page_size(2);
    store.add_collection(
        CollectionDescriptor::new("orders", "/id", IndexingPolicy::consistent()),
        vec![items("a", 3), items("b", 4)],
    );
    store.add_collection(
        CollectionDescriptor::new("users", "/id", IndexingPolicy::consistent()),
        vec![items("u", 5)],
    );
    store.add_collection(
        CollectionDescriptor::new("empty", "/id", IndexingPolicy::consistent()),
        Vec::new(),
    );
    Arc::new(store)
}

fn read_json_array(path: &Path) -> Vec<Value> {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn ids(values: &[Value]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_export_writes_one_array_per_collection() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store();
    let config = ExportConfig {
        output_dir: dir.path().to_path_buf(),
        ..ExportConfig::default()
    };

    let coordinator = ExportCoordinator::new(store, config).await.unwrap();
    let summary = coordinator.execute_export().await.unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.total_collections, 3);
    assert_eq!(summary.total_items, 12);
    assert!(summary.request_charge > 0.0);

    let run_name = summary.run_dir.file_name().unwrap().to_str().unwrap().to_string();
    assert!(run_name.starts_with("appdb_"));
    assert_eq!(summary.run_dir.parent(), Some(dir.path()));

    let orders = read_json_array(&summary.run_dir.join("orders_export.json"));
    assert_eq!(orders.len(), 7);
    let expected: BTreeSet<String> = items("a", 3)
        .iter()
        .chain(items("b", 4).iter())
        .map(|i| i.id().unwrap().to_string())
        .collect();
    assert_eq!(ids(&orders), expected);

    let empty = read_json_array(&summary.run_dir.join("empty_export.json"));
    assert!(empty.is_empty());

    let leftovers: Vec<_> = std::fs::read_dir(&summary.run_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_export_preserves_order_within_a_range() {
    let dir = TempDir::new().unwrap();
    let store = InMemoryStore::new("appdb").with_page_size(3);
    store.add_collection(
        CollectionDescriptor::new("events", "/id", IndexingPolicy::consistent()),
        vec![items("e", 20)],
    );

    let config = ExportConfig {
        output_dir: dir.path().to_path_buf(),
        encoding: Encoding::Jsonl,
        ..ExportConfig::default()
    };
    let summary = ExportCoordinator::new(Arc::new(store), config)
        .await
        .unwrap()
        .execute_export()
        .await
        .unwrap();

    let text = std::fs::read_to_string(summary.run_dir.join("events_export.jsonl")).unwrap();
    let order: Vec<String> = text
        .lines()
        .map(|line| {
            let value: Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect();
    let expected: Vec<String> = (0..20).map(|i| format!("e-{i}")).collect();
    assert_eq!(order, expected);
}

#[tokio::test]
async fn test_export_rotates_files_by_size() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store();
    let config = ExportConfig {
        output_dir: dir.path().to_path_buf(),
        collections: vec!["orders".to_string()],
        // About 200 bytes
        max_file_size_gb: Some(200.0 / (1024.0 * 1024.0 * 1024.0)),
        ..ExportConfig::default()
    };

    let summary = ExportCoordinator::new(store, config)
        .await
        .unwrap()
        .execute_export()
        .await
        .unwrap();

    let orders = summary.collection("orders").unwrap();
    assert!(orders.files.len() > 1);
    assert_eq!(orders.files[0].file_name().unwrap(), "orders_export.json");
    assert_eq!(orders.files[1].file_name().unwrap(), "orders_export_1.json");

    let mut all = BTreeSet::new();
    for path in &orders.files {
        // The closing bracket is not counted against the limit
        assert!(std::fs::metadata(path).unwrap().len() <= 200 + 2);
        let values = read_json_array(path);
        assert!(!values.is_empty());
        all.extend(ids(&values));
    }
    assert_eq!(all.len(), 7);
}

#[tokio::test]
async fn test_failed_range_does_not_stop_siblings() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store();
    store.fail_range("orders", "1");

    let config = ExportConfig {
        output_dir: dir.path().to_path_buf(),
        ..ExportConfig::default()
    };
    let summary = ExportCoordinator::new(store, config)
        .await
        .unwrap()
        .execute_export()
        .await
        .unwrap();

    assert!(!summary.is_successful());
    assert_eq!(summary.failed_collections, 1);
    assert_eq!(summary.successful_collections, 2);
    assert_eq!(summary.collection("users").unwrap().items, 5);

    let orders = read_json_array(&summary.run_dir.join("orders_export.json"));
    assert_eq!(orders.len(), 3);
}
