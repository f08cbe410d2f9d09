use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("file not found or unreadable: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("unsupported checksum algorithm: '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The fixed set of hash functions the registry accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// All supported algorithms, in lookup-priority order: when a record
    /// carries several checksums, the first entry here wins.
    pub const SUPPORTED: [HashAlgorithm; 5] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha1,
        HashAlgorithm::Md5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of this algorithm's digest rendered as hex.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(ChecksumError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

/// Compute the hex digest of a file's contents under the given algorithm.
///
/// The file is read in fixed-size chunks, so memory use stays bounded for
/// arbitrarily large inputs. A path that cannot be opened surfaces as
/// [`ChecksumError::FileNotFound`] so callers can tell bad input from an
/// internal failure.
pub fn compute_checksum(
    path: impl AsRef<Path>,
    algorithm: HashAlgorithm,
) -> Result<String, ChecksumError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| ChecksumError::FileNotFound(path.to_path_buf()))?;
    let mut reader = BufReader::new(file);
    match algorithm {
        HashAlgorithm::Md5 => stream_digest::<Md5>(&mut reader, path),
        HashAlgorithm::Sha1 => stream_digest::<Sha1>(&mut reader, path),
        HashAlgorithm::Sha256 => stream_digest::<Sha256>(&mut reader, path),
        HashAlgorithm::Sha384 => stream_digest::<Sha384>(&mut reader, path),
        HashAlgorithm::Sha512 => stream_digest::<Sha512>(&mut reader, path),
    }
}

fn stream_digest<D: Digest>(reader: &mut impl Read, path: &Path) -> Result<String, ChecksumError> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buffer).map_err(|e| ChecksumError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex digest of an in-memory byte slice.
pub fn digest_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
        HashAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
    }
}

/// One checksum as it appears on the wire and in manifest records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    pub function: String,
    pub value: String,
}

impl ChecksumRecord {
    pub fn new(function: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            value: value.into(),
        }
    }

    /// Parse the function name into a supported algorithm.
    pub fn algorithm(&self) -> Result<HashAlgorithm, ChecksumError> {
        self.function.parse()
    }
}

/// Filter a checksum set down to supported functions, ordered by lookup
/// priority. Unsupported entries are dropped, never fatal; callers that need
/// at least one survivor check for an empty result themselves.
pub fn supported_checksums(records: &[ChecksumRecord]) -> Vec<ChecksumRecord> {
    let mut kept: Vec<(usize, ChecksumRecord)> = records
        .iter()
        .filter_map(|record| {
            let algorithm = record.algorithm().ok()?;
            let priority = HashAlgorithm::SUPPORTED
                .iter()
                .position(|a| *a == algorithm)?;
            Some((priority, record.clone()))
        })
        .collect();
    kept.sort_by_key(|(priority, _)| *priority);
    kept.into_iter().map(|(_, record)| record).collect()
}
