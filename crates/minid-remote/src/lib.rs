//! Remote service clients for Minid.
//!
//! This crate holds everything that talks to the outside world: the
//! identifier registry REST client ([`HttpRegistry`]) behind the
//! [`RegistryBackend`] trait, the federated login service client
//! ([`AuthClient`]) with its one-shot local redirect listener, the on-disk
//! token store with explicit login state, and endpoint configuration.

pub mod auth;
pub mod config;
pub mod http;
pub mod tokens;

pub use auth::{receive_auth_code, AuthClient};
pub use config::{ServiceConfig, DEFAULT_AUTH_URL, DEFAULT_CLIENT_ID, DEFAULT_REGISTRY_URL};
pub use http::HttpRegistry;
pub use tokens::{ensure_logged_in, AuthError, LoginState, TokenSet, TokenStore};

use chrono::{DateTime, Utc};
use minid_schema::{ChecksumRecord, Minid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("identifier not found: {0}")]
    NotFound(String),
    #[error("unauthorized: the registry rejected the supplied credentials")]
    Unauthorized,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("remote config error: {0}")]
    Config(String),
}

/// A registered identifier record as returned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub identifier: Minid,
    #[serde(default)]
    pub checksums: Vec<ChecksumRecord>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub visible_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// Payload for minting a new identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIdentifier {
    pub checksums: Vec<ChecksumRecord>,
    pub metadata: BTreeMap<String, String>,
    pub location: Vec<String>,
    pub namespace: String,
    pub visible_to: Vec<String>,
}

/// Partial update; `None` fields keep the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec<String>>,
}

/// Wire shape of a checksum lookup response; the first match wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub identifiers: Vec<IdentifierRecord>,
}

/// Trait for identifier registry backends.
///
/// The injected client capability: constructed once at process start and
/// passed to whatever needs the registry, never ambient state. Transport
/// policy (timeouts, retries) belongs to the implementation.
pub trait RegistryBackend: Send + Sync {
    /// Mint a new identifier.
    fn create_identifier(&self, request: &CreateIdentifier)
        -> Result<IdentifierRecord, RemoteError>;

    /// Fetch one record by identifier.
    fn get_identifier(&self, identifier: &str) -> Result<IdentifierRecord, RemoteError>;

    /// Find an existing record carrying the given checksum value.
    fn lookup_by_checksum(&self, value: &str) -> Result<Option<IdentifierRecord>, RemoteError>;

    /// Update metadata and/or locations on an existing record.
    fn update_identifier(
        &self,
        identifier: &str,
        request: &UpdateIdentifier,
    ) -> Result<IdentifierRecord, RemoteError>;
}
