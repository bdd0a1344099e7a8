//! Bounded writer: drains a collection's queue into size-rotated files
//!
//! Each output file is written under a `.partial` name and renamed once its
//! closing delimiter is on disk, so every file with a final name is valid in
//! its encoding.

use crate::domain::{DumpError, Encoding, Item, Result};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

/// Suffix of files still being written
pub const PARTIAL_SUFFIX: &str = "partial";

/// Message on a collection's export queue
#[derive(Debug)]
pub enum WriterMessage {
    /// Items of one fetched page, in store order
    Batch(Vec<Item>),
    /// All fetchers are done; finalize the current file
    Finish,
}

/// Name of the `index`-th output file of a collection
///
/// Index 0 is `<collection>_export.<ext>`; rotated files are
/// `<collection>_export_<n>.<ext>` for n >= 1.
pub fn export_file_name(collection: &str, index: usize, encoding: Encoding) -> String {
    if index == 0 {
        format!("{collection}_export.{}", encoding.extension())
    } else {
        format!("{collection}_export_{index}.{}", encoding.extension())
    }
}

/// Writer settings for one collection
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Run folder the files are created in
    pub directory: PathBuf,

    /// Collection name used in file names
    pub collection: String,

    /// Output encoding
    pub encoding: Encoding,

    /// Rotate before a record would push a file past this many bytes
    pub max_file_size: Option<u64>,
}

/// What a writer produced
#[derive(Debug, Clone, Default)]
pub struct WriterReport {
    /// Completed files, in creation order
    pub files: Vec<PathBuf>,

    /// Records written across all files
    pub items: u64,

    /// Bytes written across all files
    pub bytes: u64,
}

struct OpenFile {
    final_path: PathBuf,
    partial_path: PathBuf,
    out: BufWriter<File>,
    bytes: u64,
    records: u64,
}

/// Sole consumer of a collection's export queue
pub struct BoundedWriter {
    config: WriterConfig,
    receiver: mpsc::Receiver<WriterMessage>,
    current: Option<OpenFile>,
    next_index: usize,
    report: WriterReport,
}

impl BoundedWriter {
    pub fn new(config: WriterConfig, receiver: mpsc::Receiver<WriterMessage>) -> Self {
        Self {
            config,
            receiver,
            current: None,
            next_index: 0,
            report: WriterReport::default(),
        }
    }

    /// Drain the queue until [`WriterMessage::Finish`] or until every sender
    /// is gone, then close the last file
    ///
    /// On error the file being written is removed; files already completed
    /// are kept.
    pub async fn run(mut self) -> Result<WriterReport> {
        match self.drain().await {
            Ok(()) => {
                self.close_current().await?;
                tracing::debug!(
                    collection = %self.config.collection,
                    files = self.report.files.len(),
                    items = self.report.items,
                    bytes = self.report.bytes,
                    "Writer finished"
                );
                Ok(self.report)
            }
            Err(e) => {
                self.abandon_current().await;
                Err(e)
            }
        }
    }

    async fn drain(&mut self) -> Result<()> {
        // The first file always exists, even for an empty collection
        self.open_next().await?;

        while let Some(message) = self.receiver.recv().await {
            match message {
                WriterMessage::Batch(items) => {
                    for item in &items {
                        self.write_item(item).await?;
                    }
                }
                WriterMessage::Finish => break,
            }
        }
        Ok(())
    }

    async fn write_item(&mut self, item: &Item) -> Result<()> {
        let record = item.to_bytes()?;
        let encoding = self.config.encoding;

        if self.needs_rotation(record.len() as u64) {
            self.close_current().await?;
            self.open_next().await?;
        }

        let file = self.current_file()?;
        let mut written = 0u64;
        if file.records > 0 {
            file.out.write_all(encoding.separator()).await?;
            written += encoding.separator().len() as u64;
        }
        file.out.write_all(&record).await?;
        file.out.write_all(encoding.terminator()).await?;
        written += (record.len() + encoding.terminator().len()) as u64;

        file.bytes += written;
        file.records += 1;
        self.report.items += 1;
        self.report.bytes += written;
        Ok(())
    }

    /// Whether appending a record of `record_len` bytes would overflow the
    /// current file; a file always takes at least one record
    fn needs_rotation(&self, record_len: u64) -> bool {
        let (Some(limit), Some(file)) = (self.config.max_file_size, self.current.as_ref()) else {
            return false;
        };
        if file.records == 0 {
            return false;
        }

        let encoding = self.config.encoding;
        let appended =
            encoding.separator().len() as u64 + record_len + encoding.terminator().len() as u64;
        file.bytes + appended > limit
    }

    fn current_file(&mut self) -> Result<&mut OpenFile> {
        self.current
            .as_mut()
            .ok_or_else(|| DumpError::Export("writer has no open file".to_string()))
    }

    async fn open_next(&mut self) -> Result<()> {
        let name = export_file_name(&self.config.collection, self.next_index, self.config.encoding);
        let final_path = self.config.directory.join(&name);
        let partial_path = partial_path(&final_path);

        let file = File::create(&partial_path).await.map_err(|e| {
            DumpError::Io(format!("Failed to create {}: {e}", partial_path.display()))
        })?;
        let mut out = BufWriter::new(file);

        let opening = self.config.encoding.opening();
        out.write_all(opening).await?;

        self.next_index += 1;
        self.report.bytes += opening.len() as u64;
        self.current = Some(OpenFile {
            final_path,
            partial_path,
            out,
            bytes: opening.len() as u64,
            records: 0,
        });
        Ok(())
    }

    async fn close_current(&mut self) -> Result<()> {
        let Some(mut file) = self.current.take() else {
            return Ok(());
        };

        let closing = self.config.encoding.closing();
        file.out.write_all(closing).await?;
        file.out.flush().await?;
        file.out.into_inner().sync_all().await?;

        tokio::fs::rename(&file.partial_path, &file.final_path)
            .await
            .map_err(|e| {
                DumpError::Io(format!(
                    "Failed to finalize {}: {e}",
                    file.final_path.display()
                ))
            })?;

        self.report.bytes += closing.len() as u64;
        tracing::debug!(
            file = %file.final_path.display(),
            records = file.records,
            "Output file closed"
        );
        self.report.files.push(file.final_path);
        Ok(())
    }

    async fn abandon_current(&mut self) {
        if let Some(file) = self.current.take() {
            drop(file.out);
            if let Err(e) = tokio::fs::remove_file(&file.partial_path).await {
                tracing::warn!(
                    file = %file.partial_path.display(),
                    error = %e,
                    "Failed to remove partial output file"
                );
            }
        }
    }
}

fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn item(id: usize) -> Item {
        Item::try_from(json!({"id": format!("item-{id:03}"), "payload": "x".repeat(20)})).unwrap()
    }

    fn config(dir: &TempDir, encoding: Encoding, max_file_size: Option<u64>) -> WriterConfig {
        WriterConfig {
            directory: dir.path().to_path_buf(),
            collection: "orders".to_string(),
            encoding,
            max_file_size,
        }
    }

    async fn write_all(config: WriterConfig, batches: Vec<Vec<Item>>) -> Result<WriterReport> {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(BoundedWriter::new(config, rx).run());
        for batch in batches {
            tx.send(WriterMessage::Batch(batch)).await.unwrap();
        }
        tx.send(WriterMessage::Finish).await.unwrap();
        handle.await.unwrap()
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("orders", 0, Encoding::Json), "orders_export.json");
        assert_eq!(
            export_file_name("orders", 2, Encoding::Jsonl),
            "orders_export_2.jsonl"
        );
    }

    #[tokio::test]
    async fn test_single_array_file() {
        let dir = TempDir::new().unwrap();
        let report = write_all(
            config(&dir, Encoding::Json, None),
            vec![vec![item(1), item(2)], vec![item(3)]],
        )
        .await
        .unwrap();

        assert_eq!(report.files, vec![dir.path().join("orders_export.json")]);
        assert_eq!(report.items, 3);

        let text = std::fs::read_to_string(&report.files[0]).unwrap();
        assert!(text.starts_with("[\n"));
        assert!(text.ends_with("\n]"));
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(report.bytes, text.len() as u64);
    }

    #[tokio::test]
    async fn test_empty_collection_still_valid() {
        let dir = TempDir::new().unwrap();
        let report = write_all(config(&dir, Encoding::Json, None), vec![])
            .await
            .unwrap();

        let text = std::fs::read_to_string(&report.files[0]).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_produces_valid_files() {
        let dir = TempDir::new().unwrap();
        let items: Vec<Item> = (0..10).map(item).collect();
        let record_len = items[0].to_bytes().unwrap().len() as u64;

        // Room for the opening bracket and three records
        let limit = 2 + 3 * record_len + 2 * 2;
        let report = write_all(config(&dir, Encoding::Json, Some(limit)), vec![items])
            .await
            .unwrap();

        assert_eq!(report.files.len(), 4);
        assert_eq!(report.files[0], dir.path().join("orders_export.json"));
        assert_eq!(report.files[1], dir.path().join("orders_export_1.json"));
        assert_eq!(report.files[3], dir.path().join("orders_export_3.json"));

        let mut ids = Vec::new();
        for path in &report.files {
            let text = std::fs::read_to_string(path).unwrap();
            let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
            assert!(!parsed.is_empty());
            ids.extend(parsed.into_iter().map(|v| v["id"].as_str().unwrap().to_string()));
        }
        let expected: Vec<String> = (0..10).map(|i| format!("item-{i:03}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_oversized_record_gets_its_own_file() {
        let dir = TempDir::new().unwrap();
        let report = write_all(
            config(&dir, Encoding::Jsonl, Some(1)),
            vec![vec![item(1), item(2)]],
        )
        .await
        .unwrap();

        assert_eq!(report.files.len(), 2);
        for path in &report.files {
            let text = std::fs::read_to_string(path).unwrap();
            assert_eq!(text.lines().count(), 1);
            assert!(text.ends_with('\n'));
        }
    }

    #[tokio::test]
    async fn test_jsonl_lines() {
        let dir = TempDir::new().unwrap();
        let report = write_all(
            config(&dir, Encoding::Jsonl, None),
            vec![vec![item(1), item(2)]],
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(dir.path().join("orders_export.jsonl")).unwrap();
        assert_eq!(report.files.len(), 1);
        for line in text.lines() {
            let value: Value = serde_json::from_str(line).unwrap();
            assert!(value.get("id").is_some());
        }
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_closed_channel_finalizes() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(BoundedWriter::new(config(&dir, Encoding::Json, None), rx).run());
        tx.send(WriterMessage::Batch(vec![item(1)])).await.unwrap();
        drop(tx);

        let report = handle.await.unwrap().unwrap();
        let text = std::fs::read_to_string(&report.files[0]).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[tokio::test]
    async fn test_no_partial_files_left() {
        let dir = TempDir::new().unwrap();
        write_all(config(&dir, Encoding::Json, Some(64)), vec![(0..5).map(item).collect()])
            .await
            .unwrap();

        let partials = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(partials, 0);
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, Encoding::Json, None);
        cfg.directory = dir.path().join("does-not-exist");
        let (_tx, rx) = mpsc::channel(1);
        assert!(BoundedWriter::new(cfg, rx).run().await.is_err());
    }
}
