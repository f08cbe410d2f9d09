//! Remote-file-manifest (RFM) parsing.
//!
//! A manifest is either a single JSON document (an array of entry objects, or
//! an object whose values are entry objects) or a newline-delimited stream
//! with one JSON entry object per line. [`classify_manifest`] decides which,
//! explicitly and without consuming anything; [`read_manifest_entries`]
//! yields entries one at a time in document order.

use crate::checksum::{ChecksumRecord, HashAlgorithm};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to parse manifest line {line}: {source}")]
    ParseLine {
        line: usize,
        source: serde_json::Error,
    },
    #[error("manifest root must be an array or object of records, got a {0}")]
    InvalidRoot(&'static str),
}

/// How a manifest file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// One JSON document holding every entry.
    SingleDocument,
    /// One JSON entry object per non-blank line.
    LineDelimited,
}

/// Decide whether a manifest file is a single JSON document or a
/// line-delimited stream. Side-effect-free: the decision never consumes
/// anything a later read depends on.
pub fn classify_manifest(path: impl AsRef<Path>) -> Result<ManifestFormat, ManifestError> {
    let content = fs::read_to_string(path)?;
    classify_manifest_str(&content)
}

/// Classification on an already-loaded manifest body.
///
/// A whole-file parse that yields an array, or an object whose values are all
/// objects, is a single document. An object with scalar values is one flat
/// record, i.e. a stream of one line. Anything that fails the whole-file
/// parse (multiple top-level values) is a stream.
pub fn classify_manifest_str(content: &str) -> Result<ManifestFormat, ManifestError> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(_)) => Ok(ManifestFormat::SingleDocument),
        Ok(Value::Object(map)) => {
            if map.values().all(Value::is_object) {
                Ok(ManifestFormat::SingleDocument)
            } else {
                Ok(ManifestFormat::LineDelimited)
            }
        }
        Ok(Value::String(_)) => Err(ManifestError::InvalidRoot("string")),
        Ok(Value::Number(_)) => Err(ManifestError::InvalidRoot("number")),
        Ok(Value::Bool(_)) => Err(ManifestError::InvalidRoot("boolean")),
        Ok(Value::Null) => Err(ManifestError::InvalidRoot("null")),
        Err(_) => Ok(ManifestFormat::LineDelimited),
    }
}

/// One manifest record: recognized fields plus checksum-function keys and
/// free-form metadata carried in `fields`. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl ManifestEntry {
    /// Checksums found on this entry, in lookup-priority order.
    pub fn checksums(&self) -> Vec<ChecksumRecord> {
        HashAlgorithm::SUPPORTED
            .iter()
            .filter_map(|algorithm| {
                let value = self.fields.get(algorithm.as_str())?.as_str()?;
                Some(ChecksumRecord::new(algorithm.as_str(), value))
            })
            .collect()
    }

    /// Scalar fields that are not checksums, stringified for use as
    /// identifier metadata. `length` is included as a string when present.
    pub fn extra_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        for (key, value) in &self.fields {
            if key.parse::<HashAlgorithm>().is_ok() {
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            metadata.insert(key.clone(), rendered);
        }
        if let Some(length) = self.length {
            metadata.insert("length".to_owned(), length.to_string());
        }
        metadata
    }
}

/// Lazy iterator over manifest entries. Restartable by calling
/// [`read_manifest_entries`] again on the same path.
pub enum ManifestEntries {
    Single(std::vec::IntoIter<ManifestEntry>),
    Lines {
        lines: std::io::Lines<BufReader<File>>,
        line: usize,
    },
}

/// Open a manifest and return its entries in document order.
///
/// Single-document mode has to parse the whole document up front;
/// line-delimited mode streams from a fresh reader, skipping blank lines. A
/// malformed line fails with [`ManifestError::ParseLine`] naming the 1-based
/// offending line — it is never silently skipped.
pub fn read_manifest_entries(path: impl AsRef<Path>) -> Result<ManifestEntries, ManifestError> {
    let path = path.as_ref();
    match classify_manifest(path)? {
        ManifestFormat::SingleDocument => {
            let content = fs::read_to_string(path)?;
            let root: Value = serde_json::from_str(&content)?;
            let values: Vec<Value> = match root {
                Value::Array(items) => items,
                Value::Object(map) => map.into_iter().map(|(_, value)| value).collect(),
                _ => return Err(ManifestError::InvalidRoot("scalar")),
            };
            let entries = values
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<ManifestEntry>, _>>()?;
            Ok(ManifestEntries::Single(entries.into_iter()))
        }
        ManifestFormat::LineDelimited => {
            let file = File::open(path)?;
            Ok(ManifestEntries::Lines {
                lines: BufReader::new(file).lines(),
                line: 0,
            })
        }
    }
}

impl Iterator for ManifestEntries {
    type Item = Result<ManifestEntry, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Single(iter) => iter.next().map(Ok),
            Self::Lines { lines, line } => loop {
                let raw = match lines.next()? {
                    Ok(raw) => raw,
                    Err(e) => return Some(Err(ManifestError::Io(e))),
                };
                *line += 1;
                if raw.trim().is_empty() {
                    continue;
                }
                return Some(serde_json::from_str(&raw).map_err(|source| {
                    ManifestError::ParseLine {
                        line: *line,
                        source,
                    }
                }));
            },
        }
    }
}
