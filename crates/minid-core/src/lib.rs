//! Identifier registration and resolution engine.
//!
//! [`MinidClient`] wraps a [`RegistryBackend`](minid_remote::RegistryBackend)
//! and implements the register/check/update workflow on top of it: checksum
//! filtering, dedup-by-checksum before minting, manifest-driven batch
//! registration, and target classification for `check`.

pub mod batch;
pub mod client;
pub mod concurrency;

pub use batch::{BatchFailure, BatchReport};
pub use client::{
    classify_check_target, CheckTarget, MinidClient, RegisterOptions, RegisterOutcome, NAMESPACE,
    TEST_NAMESPACE,
};
pub use concurrency::{install_signal_handler, interrupted, request_interrupt, reset_interrupt};

use minid_remote::RemoteError;
use minid_schema::{ChecksumError, ManifestError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("no supported checksum function among: {0}")]
    UnsupportedChecksum(String),
    #[error("registration failed: {0}")]
    Registration(RemoteError),
    #[error("lookup failed: {0}")]
    Lookup(RemoteError),
}
