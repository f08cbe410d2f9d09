//! Checksum computation, remote-file-manifest parsing, and identifier types for Minid.
//!
//! This crate defines the schema layer: the fixed set of supported hash
//! algorithms and streaming file digests (`compute_checksum`), checksum wire
//! records (`ChecksumRecord`), remote-file-manifest classification and lazy
//! entry iteration (`read_manifest_entries`), and the `Minid` identifier
//! newtype.

pub mod checksum;
pub mod manifest;
pub mod types;

pub use checksum::{
    compute_checksum, digest_bytes, supported_checksums, ChecksumError, ChecksumRecord,
    HashAlgorithm,
};
pub use manifest::{
    classify_manifest, classify_manifest_str, read_manifest_entries, ManifestEntries,
    ManifestEntry, ManifestError, ManifestFormat,
};
pub use types::Minid;
