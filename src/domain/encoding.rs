//! Output file encodings

use crate::domain::{DumpError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding of an export file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// A single JSON array: `[\n`, records joined by `,\n`, then `\n]`
    #[default]
    Json,
    /// One JSON value per line, no wrapper
    Jsonl,
}

impl Encoding {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Jsonl => "jsonl",
        }
    }

    /// Bytes written before the first record
    pub fn opening(&self) -> &'static [u8] {
        match self {
            Encoding::Json => b"[\n",
            Encoding::Jsonl => b"",
        }
    }

    /// Bytes written between two records
    pub fn separator(&self) -> &'static [u8] {
        match self {
            Encoding::Json => b",\n",
            Encoding::Jsonl => b"",
        }
    }

    /// Bytes written after each record
    pub fn terminator(&self) -> &'static [u8] {
        match self {
            Encoding::Json => b"",
            Encoding::Jsonl => b"\n",
        }
    }

    /// Bytes written after the last record
    pub fn closing(&self) -> &'static [u8] {
        match self {
            Encoding::Json => b"\n]",
            Encoding::Jsonl => b"",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for Encoding {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Encoding::Json),
            "jsonl" | "ndjson" => Ok(Encoding::Jsonl),
            other => Err(DumpError::Configuration(format!(
                "Invalid encoding '{other}'. Must be one of: json, jsonl"
            ))),
        }
    }
}
