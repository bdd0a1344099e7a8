//! Streaming parser for export files
//!
//! The first non-whitespace byte decides the mode: `[` means a JSON array of
//! objects, anything else a stream of concatenated or newline-delimited
//! values. Items are produced one at a time; the file is never held in
//! memory.

use crate::domain::{DumpError, Item, Result};
use serde::Deserialize;
use serde_json::de::IoRead;
use serde_json::{StreamDeserializer, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How a file is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// A single JSON array of objects
    Array,
    /// Concatenated or newline-delimited JSON values
    Lines,
}

/// One decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A document to import
    Item(Item),
    /// A well-formed value that is not a document; counted as a failure
    Skipped(String),
}

/// Pick the parse mode from the first non-whitespace byte, then rewind
///
/// Empty and whitespace-only inputs are treated as [`ParseMode::Lines`].
pub fn sniff_encoding<R: Read + Seek>(reader: &mut R) -> Result<ParseMode> {
    let mut buf = [0u8; 4096];
    let mode = loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break ParseMode::Lines;
        }
        if let Some(&first) = buf[..n].iter().find(|b| !b.is_ascii_whitespace()) {
            break if first == b'[' {
                ParseMode::Array
            } else {
                ParseMode::Lines
            };
        }
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(mode)
}

/// Open a file and sniff its mode
pub fn open_items(path: &Path) -> Result<ItemReader<File>> {
    let mut file = File::open(path)
        .map_err(|e| DumpError::Io(format!("Failed to open {}: {e}", path.display())))?;
    let mode = sniff_encoding(&mut file)?;
    tracing::debug!(file = %path.display(), mode = ?mode, "Parsing import file");
    Ok(ItemReader::new(file, mode))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Start,
    First,
    AfterElement,
    End,
}

enum Decoder<R: Read> {
    Array {
        reader: BufReader<R>,
        state: ArrayState,
    },
    Lines(StreamDeserializer<'static, IoRead<BufReader<R>>, Value>),
    Done,
}

/// Lazy sequence of records from one input
///
/// Yields `Err` at most once; a syntax error ends the sequence.
pub struct ItemReader<R: Read> {
    decoder: Decoder<R>,
}

impl<R: Read> ItemReader<R> {
    pub fn new(reader: R, mode: ParseMode) -> Self {
        let reader = BufReader::new(reader);
        let decoder = match mode {
            ParseMode::Array => Decoder::Array {
                reader,
                state: ArrayState::Start,
            },
            ParseMode::Lines => {
                Decoder::Lines(serde_json::Deserializer::from_reader(reader).into_iter())
            }
        };
        Self { decoder }
    }

    fn next_array(reader: &mut BufReader<R>, state: &mut ArrayState) -> Result<Option<Record>> {
        loop {
            match *state {
                ArrayState::Start => {
                    expect_byte(reader, b'[')?;
                    *state = ArrayState::First;
                }
                ArrayState::First => {
                    if peek_non_ws(reader)? == Some(b']') {
                        reader.consume(1);
                        *state = ArrayState::End;
                        continue;
                    }
                    *state = ArrayState::AfterElement;
                    return read_element(reader).map(Some);
                }
                ArrayState::AfterElement => match peek_non_ws(reader)? {
                    Some(b',') => {
                        reader.consume(1);
                        return read_element(reader).map(Some);
                    }
                    Some(b']') => {
                        reader.consume(1);
                        *state = ArrayState::End;
                    }
                    other => return Err(unexpected(other, "',' or ']'")),
                },
                ArrayState::End => {
                    return match peek_non_ws(reader)? {
                        None => Ok(None),
                        other => Err(unexpected(other, "end of input after ']'")),
                    };
                }
            }
        }
    }
}

impl<R: Read> Iterator for ItemReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match &mut self.decoder {
            Decoder::Done => return None,
            Decoder::Array { reader, state } => Self::next_array(reader, state).transpose(),
            Decoder::Lines(stream) => stream.next().map(|value| {
                value
                    .map_err(|e| DumpError::Serialization(format!("Invalid JSON: {e}")))
                    .map(into_record)
            }),
        };

        match result {
            None => {
                self.decoder = Decoder::Done;
                None
            }
            Some(Err(e)) => {
                self.decoder = Decoder::Done;
                Some(Err(e))
            }
            Some(Ok(record)) => Some(Ok(record)),
        }
    }
}

fn into_record(value: Value) -> Record {
    match Item::try_from(value) {
        Ok(item) => Record::Item(item),
        Err(e) => Record::Skipped(e.to_string()),
    }
}

/// Skip whitespace and look at the next byte without consuming it
fn peek_non_ws<R: Read>(reader: &mut BufReader<R>) -> Result<Option<u8>> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let byte = buf[pos];
                reader.consume(pos);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn expect_byte<R: Read>(reader: &mut BufReader<R>, expected: u8) -> Result<()> {
    match peek_non_ws(reader)? {
        Some(b) if b == expected => {
            reader.consume(1);
            Ok(())
        }
        other => Err(unexpected(other, &format!("'{}'", expected as char))),
    }
}

/// Decode one array element, which must be an object
///
/// Objects end on their closing brace, so the decoder never reads past the
/// element and the surrounding array syntax stays intact.
fn read_element<R: Read>(reader: &mut BufReader<R>) -> Result<Record> {
    match peek_non_ws(reader)? {
        Some(b'{') => {}
        other => return Err(unexpected(other, "a JSON object")),
    }

    let mut de = serde_json::Deserializer::from_reader(&mut *reader);
    let value = Value::deserialize(&mut de)
        .map_err(|e| DumpError::Serialization(format!("Invalid array element: {e}")))?;
    Ok(into_record(value))
}

fn unexpected(found: Option<u8>, expected: &str) -> DumpError {
    match found {
        Some(b) => DumpError::Serialization(format!(
            "Unexpected '{}' in JSON array, expected {expected}",
            b.escape_ascii()
        )),
        None => DumpError::Serialization(format!(
            "Unexpected end of JSON array, expected {expected}"
        )),
    }
}

/// Records of a file being parsed on a blocking thread
pub struct ParsedItems {
    /// Decoded records; an `Err` is always the last message
    pub receiver: mpsc::Receiver<Result<Record>>,

    /// Parser thread; ends early when the receiver is dropped
    pub task: JoinHandle<()>,
}

/// Parse `path` on the blocking pool, sending records through a channel of
/// `capacity` so the file is read only as fast as it is consumed
pub fn spawn_parser(path: PathBuf, capacity: usize) -> ParsedItems {
    let (sender, receiver) = mpsc::channel(capacity.max(1));

    let task = tokio::task::spawn_blocking(move || {
        let reader = match open_items(&path) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = sender.blocking_send(Err(e));
                return;
            }
        };

        for record in reader {
            if sender.blocking_send(record).is_err() {
                tracing::debug!(file = %path.display(), "Parser stopped, consumer gone");
                return;
            }
        }
    });

    ParsedItems { receiver, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Vec<Result<Record>> {
        let mut cursor = Cursor::new(input.as_bytes().to_vec());
        let mode = sniff_encoding(&mut cursor).unwrap();
        ItemReader::new(cursor, mode).collect()
    }

    fn ids(records: &[Result<Record>]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| match r {
                Ok(Record::Item(item)) => item.id().map(str::to_string),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_sniff_rewinds() {
        let mut cursor = Cursor::new(b"  \n [ {}]".to_vec());
        assert_eq!(sniff_encoding(&mut cursor).unwrap(), ParseMode::Array);
        assert_eq!(cursor.position(), 0);

        let mut cursor = Cursor::new(b"{\"id\":\"a\"}\n".to_vec());
        assert_eq!(sniff_encoding(&mut cursor).unwrap(), ParseMode::Lines);

        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(sniff_encoding(&mut cursor).unwrap(), ParseMode::Lines);
    }

    #[test]
    fn test_array_mode() {
        let records = parse("[\n{\"id\":\"a\",\"n\":[1,2]},\n{\"id\":\"b\",\"nested\":{\"x\":1.5}}\n]");
        assert_eq!(records.len(), 2);
        assert_eq!(ids(&records), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_array_variants() {
        assert!(parse("[]").is_empty());
        assert!(parse("[\n\n]").is_empty());
        assert!(parse("   ").is_empty());
    }

    #[test]
    fn test_array_preserves_field_order() {
        let records = parse(r#"[{"z":1,"id":"a","m":2}]"#);
        let Ok(Record::Item(item)) = &records[0] else {
            panic!("expected an item");
        };
        let keys: Vec<&str> = item.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "id", "m"]);
    }

    #[test]
    fn test_truncated_array_is_error() {
        let records = parse("[\n{\"id\":\"a\"},\n{\"id\":");
        assert_eq!(ids(&records), vec!["a"]);
        assert!(records.last().unwrap().is_err());
    }

    #[test]
    fn test_missing_close_bracket_is_error() {
        let records = parse("[{\"id\":\"a\"}");
        assert_eq!(records.len(), 2);
        assert!(records[1].is_err());
    }

    #[test]
    fn test_non_object_array_element_stops_file() {
        let records = parse("[{\"id\":\"a\"}, 42, {\"id\":\"b\"}]");
        assert_eq!(ids(&records), vec!["a"]);
        assert_eq!(records.len(), 2);
        assert!(records[1].is_err());
    }

    #[test]
    fn test_trailing_garbage_is_error() {
        let records = parse("[{\"id\":\"a\"}] x");
        assert!(records.last().unwrap().is_err());
    }

    #[test]
    fn test_lines_mode() {
        let records = parse("{\"id\":\"a\"}\n\n{\"id\":\"b\"}{\"id\":\"c\"}\n");
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lines_mode_skips_non_objects() {
        let records = parse("{\"id\":\"a\"}\n7\n\"text\"\n{\"id\":\"b\"}\n");
        assert_eq!(ids(&records), vec!["a", "b"]);
        let skipped = records
            .iter()
            .filter(|r| matches!(r, Ok(Record::Skipped(_))))
            .count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_lines_mode_syntax_error_ends_stream() {
        let records = parse("{\"id\":\"a\"}\n{broken\n{\"id\":\"b\"}\n");
        assert_eq!(ids(&records), vec!["a"]);
        assert!(records.last().unwrap().is_err());
    }

    #[tokio::test]
    async fn test_spawn_parser_streams_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("orders_export.jsonl");
        let body: String = (0..50).map(|i| format!("{{\"id\":\"{i}\"}}\n")).collect();
        std::fs::write(&path, body).unwrap();

        let mut parsed = spawn_parser(path, 4);
        let mut count = 0;
        while let Some(record) = parsed.receiver.recv().await {
            assert!(matches!(record, Ok(Record::Item(_))));
            count += 1;
        }
        parsed.task.await.unwrap();
        assert_eq!(count, 50);
    }

    #[tokio::test]
    async fn test_spawn_parser_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut parsed = spawn_parser(dir.path().join("missing.json"), 4);
        let first = parsed.receiver.recv().await.unwrap();
        assert!(first.is_err());
        assert!(parsed.receiver.recv().await.is_none());
    }
}
