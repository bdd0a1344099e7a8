//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables hold ENV_MUTEX to avoid
//! interference between tests.

use cosmos_dump::config::{load_config, load_config_or_default};
use cosmos_dump::domain::Encoding;
use secrecy::ExposeSecret;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    for name in [
        "COSMOS_DUMP_LOG_LEVEL",
        "COSMOS_DUMP_ENDPOINT",
        "COSMOS_DUMP_KEY",
        "COSMOS_DUMP_DATABASE",
        "COSMOS_DUMP_OUTPUT_DIR",
        "COSMOS_DUMP_ENCODING",
        "COSMOS_DUMP_MAX_FILE_SIZE_GB",
        "COSMOS_DUMP_IMPORT_CONCURRENCY",
        "COSMOS_DUMP_IMPORT_SHUFFLE",
        "TEST_COSMOS_KEY",
    ] {
        std::env::remove_var(name);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "debug"
progress = false

[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "dGVzdC1rZXk="
database_name = "appdb"
request_timeout_seconds = 30
max_retries = 3

[export]
output_dir = "/tmp/cosmos-dump"
encoding = "jsonl"
max_file_size_gb = 0.5
collections = ["orders", "users"]
queue_capacity = 50

[import]
path = "/tmp/cosmos-dump/appdb_2025-01-01-00-00"
concurrency = 64
scheduling_headroom = 10
shuffle = true
shuffle_capacity = 1000
workers = 2
source_collection = "orders"
destination_collection = "orders_v2"
partition_key_path = "/tenantId"

[logging]
local_enabled = true
local_path = "/tmp/cosmos-dump/logs"
local_rotation = "hourly"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert!(config.validate().is_ok());

    assert_eq!(config.application.log_level, "debug");
    assert!(!config.application.progress);
    assert_eq!(config.cosmosdb.database_name, "appdb");
    assert_eq!(config.cosmosdb.key.expose_secret().as_ref(), "dGVzdC1rZXk=");
    assert_eq!(config.cosmosdb.max_retries, 3);
    assert_eq!(config.export.encoding, Encoding::Jsonl);
    assert_eq!(config.export.collections, vec!["orders", "users"]);
    assert_eq!(config.export.max_file_size_bytes(), Some(512 * 1024 * 1024));
    assert_eq!(
        config.import.path,
        Some(PathBuf::from("/tmp/cosmos-dump/appdb_2025-01-01-00-00"))
    );
    assert_eq!(config.import.concurrency, 64);
    assert!(config.import.shuffle);
    assert_eq!(config.import.destination_collection.as_deref(), Some("orders_v2"));
    assert_eq!(config.import.partition_key_path, "/tenantId");
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "dGVzdC1rZXk="
database_name = "appdb"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.export.encoding, Encoding::Json);
    assert_eq!(config.export.queue_capacity, 100);
    assert!(config.export.max_file_size_bytes().is_none());
    assert_eq!(config.import.concurrency, 100);
    assert_eq!(config.import.scheduling_headroom, 20);
    assert_eq!(config.import.shuffle_capacity, 5000);
    assert_eq!(config.import.partition_key_path, "/id");
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_COSMOS_KEY", "c3Vic3RpdHV0ZWQ=");

    let file = write_config(
        r#"
[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "${TEST_COSMOS_KEY}"
database_name = "appdb"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.cosmosdb.key.expose_secret().as_ref(), "c3Vic3RpdHV0ZWQ=");
    cleanup_env_vars();
}

#[test]
fn test_missing_env_var_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[cosmosdb]
key = "${TEST_COSMOS_KEY}"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_COSMOS_KEY"));
}

#[test]
fn test_env_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("COSMOS_DUMP_DATABASE", "envdb");
    std::env::set_var("COSMOS_DUMP_ENCODING", "jsonl");
    std::env::set_var("COSMOS_DUMP_MAX_FILE_SIZE_GB", "2");
    std::env::set_var("COSMOS_DUMP_IMPORT_CONCURRENCY", "12");
    std::env::set_var("COSMOS_DUMP_IMPORT_SHUFFLE", "true");

    let file = write_config(
        r#"
[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "dGVzdC1rZXk="
database_name = "filedb"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.cosmosdb.database_name, "envdb");
    assert_eq!(config.export.encoding, Encoding::Jsonl);
    assert_eq!(config.export.max_file_size_gb, Some(2.0));
    assert_eq!(config.import.concurrency, 12);
    assert!(config.import.shuffle);
    cleanup_env_vars();
}

#[test]
fn test_absent_file_falls_back_to_environment() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("COSMOS_DUMP_ENDPOINT", "https://env.documents.azure.com:443/");
    std::env::set_var("COSMOS_DUMP_KEY", "ZW52LWtleQ==");
    std::env::set_var("COSMOS_DUMP_DATABASE", "envdb");

    let dir = tempfile::TempDir::new().unwrap();
    let config = load_config_or_default(dir.path().join("missing.toml")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.cosmosdb.endpoint, "https://env.documents.azure.com:443/");

    assert!(load_config(dir.path().join("missing.toml")).is_err());
    cleanup_env_vars();
}

#[test]
fn test_validation_failures() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let cases = [
        (
            "endpoint = \"ftp://t.documents.azure.com/\"\ndatabase_name = \"db\"",
            "endpoint",
        ),
        (
            "endpoint = \"https://t.documents.azure.com/\"\ndatabase_name = \"\"",
            "database_name",
        ),
    ];
    for (lines, expected) in cases {
        let file = write_config(&format!("[cosmosdb]\nkey = \"a2V5\"\n{lines}\n"));
        let err = load_config(file.path()).unwrap().validate().unwrap_err();
        assert!(err.contains(expected), "{err}");
    }

    let file = write_config(
        r#"
[cosmosdb]
endpoint = "https://t.documents.azure.com/"
key = "a2V5"
database_name = "db"

[import]
concurrency = 5000
"#,
    );
    let err = load_config(file.path()).unwrap().validate().unwrap_err();
    assert!(err.contains("concurrency"));

    let file = write_config(
        r#"
[cosmosdb]
endpoint = "https://t.documents.azure.com/"
key = "a2V5"
database_name = "db"

[export]
max_file_size_gb = -1.0
"#,
    );
    let err = load_config(file.path()).unwrap().validate().unwrap_err();
    assert!(err.contains("max_file_size_gb"));
}

#[test]
fn test_invalid_encoding_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[export]
encoding = "csv"
"#,
    );
    assert!(load_config(file.path()).is_err());
}
