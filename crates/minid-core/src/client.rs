//! The register/check/update workflow over a registry backend.

use crate::CoreError;
use minid_remote::{
    CreateIdentifier, IdentifierRecord, RegistryBackend, RemoteError, UpdateIdentifier,
};
use minid_schema::{
    compute_checksum, supported_checksums, ChecksumError, ChecksumRecord, HashAlgorithm,
    ManifestEntry,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Namespace for production identifiers.
pub const NAMESPACE: &str = "minid";
/// Namespace for throwaway test identifiers.
pub const TEST_NAMESPACE: &str = "minid.test";

/// Metadata key holding the human-readable title.
const ERC_WHAT: &str = "erc.what";
/// Metadata profile marker attached to file registrations.
const ERC_PROFILE: (&str, &str) = ("_profile", "erc");

/// Prefixes that mark a `check` argument as an identifier rather than a
/// checksum or a file path.
const IDENTIFIER_PREFIXES: [&str; 4] = ["minid:", "minid.test:", "hdl:", "ark:/"];

/// Caller-supplied knobs for a registration.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub title: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub locations: Vec<String>,
    pub test: bool,
    pub force_new: bool,
}

/// What a registration produced: the record, and whether it was minted now
/// or matched against an existing one.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub record: IdentifierRecord,
    pub created: bool,
}

/// What kind of thing a `check` argument names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckTarget {
    Identifier,
    Checksum,
    FilePath,
}

/// Classify a `check` argument explicitly: a known identifier prefix wins,
/// then an existing file path, then a bare hex string of a known digest
/// length. Everything else is treated as a (missing) file path.
pub fn classify_check_target(entity: &str) -> CheckTarget {
    if IDENTIFIER_PREFIXES
        .iter()
        .any(|prefix| entity.starts_with(prefix))
    {
        return CheckTarget::Identifier;
    }
    if Path::new(entity).exists() {
        return CheckTarget::FilePath;
    }
    let is_hex = !entity.is_empty() && entity.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex
        && HashAlgorithm::SUPPORTED
            .iter()
            .any(|algorithm| algorithm.hex_len() == entity.len())
    {
        return CheckTarget::Checksum;
    }
    CheckTarget::FilePath
}

/// Resolver and registrar over an injected [`RegistryBackend`].
pub struct MinidClient {
    registry: Box<dyn RegistryBackend>,
}

impl MinidClient {
    pub fn new(registry: Box<dyn RegistryBackend>) -> Self {
        Self { registry }
    }

    /// Register a checksum set: dedup against the registry first (unless
    /// `force_new`), then mint.
    pub fn register(
        &self,
        checksums: &[ChecksumRecord],
        options: &RegisterOptions,
    ) -> Result<RegisterOutcome, CoreError> {
        let usable = supported_checksums(checksums);
        if usable.is_empty() {
            let offending: Vec<&str> =
                checksums.iter().map(|c| c.function.as_str()).collect();
            return Err(CoreError::UnsupportedChecksum(offending.join(", ")));
        }

        if !options.force_new {
            for checksum in &usable {
                let found = self
                    .registry
                    .lookup_by_checksum(&checksum.value)
                    .map_err(CoreError::Lookup)?;
                if let Some(record) = found {
                    debug!(
                        "checksum {} already registered as {}",
                        checksum.value, record.identifier
                    );
                    return Ok(RegisterOutcome {
                        record,
                        created: false,
                    });
                }
            }
        }

        let mut metadata = options.metadata.clone();
        if let Some(ref title) = options.title {
            metadata.insert(ERC_WHAT.to_owned(), title.clone());
        }
        let namespace = if options.test { TEST_NAMESPACE } else { NAMESPACE };
        let request = CreateIdentifier {
            checksums: usable,
            metadata,
            location: options.locations.clone(),
            namespace: namespace.to_owned(),
            visible_to: vec!["public".to_owned()],
        };
        let record = self
            .registry
            .create_identifier(&request)
            .map_err(CoreError::Registration)?;
        debug!("minted {}", record.identifier);
        Ok(RegisterOutcome {
            record,
            created: true,
        })
    }

    /// Register a single file by its sha256. The title defaults to the file
    /// name and the metadata is marked with the `erc` profile.
    pub fn register_file(
        &self,
        path: &Path,
        options: &RegisterOptions,
    ) -> Result<RegisterOutcome, CoreError> {
        let value = compute_checksum(path, HashAlgorithm::Sha256)?;
        let mut options = options.clone();
        if options.title.is_none() {
            options.title = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        options
            .metadata
            .insert(ERC_PROFILE.0.to_owned(), ERC_PROFILE.1.to_owned());
        self.register(&[ChecksumRecord::new("sha256", &value)], &options)
    }

    /// Register one manifest entry: its checksums in priority order, the
    /// filename as title, the URL as location, and the remaining scalar
    /// fields as metadata.
    pub fn get_or_register(
        &self,
        entry: &ManifestEntry,
        options: &RegisterOptions,
    ) -> Result<RegisterOutcome, CoreError> {
        let checksums = entry.checksums();
        if checksums.is_empty() {
            let offending: Vec<String> = entry.fields.keys().cloned().collect();
            return Err(CoreError::UnsupportedChecksum(offending.join(", ")));
        }
        let mut options = options.clone();
        if options.title.is_none() {
            options.title = entry.filename.clone();
        }
        if let Some(ref url) = entry.url {
            if !options.locations.contains(url) {
                options.locations.push(url.clone());
            }
        }
        for (key, value) in entry.extra_metadata() {
            options.metadata.entry(key).or_insert(value);
        }
        self.register(&checksums, &options)
    }

    /// Resolve an identifier, checksum, or file to its registered record.
    /// `None` means nothing is registered; a missing file is an error.
    pub fn check(
        &self,
        entity: &str,
        algorithm: HashAlgorithm,
    ) -> Result<Option<IdentifierRecord>, CoreError> {
        match classify_check_target(entity) {
            CheckTarget::Identifier => match self.registry.get_identifier(entity) {
                Ok(record) => Ok(Some(record)),
                Err(RemoteError::NotFound(_)) => Ok(None),
                Err(e) => Err(CoreError::Lookup(e)),
            },
            CheckTarget::Checksum => self
                .registry
                .lookup_by_checksum(entity)
                .map_err(CoreError::Lookup),
            CheckTarget::FilePath => {
                let path = Path::new(entity);
                if !path.exists() {
                    return Err(CoreError::Checksum(ChecksumError::FileNotFound(
                        path.to_path_buf(),
                    )));
                }
                let value = compute_checksum(path, algorithm)?;
                self.registry
                    .lookup_by_checksum(&value)
                    .map_err(CoreError::Lookup)
            }
        }
    }

    /// Update the title and/or locations of an existing identifier.
    pub fn update(
        &self,
        identifier: &str,
        title: Option<&str>,
        locations: Option<Vec<String>>,
    ) -> Result<IdentifierRecord, CoreError> {
        let request = UpdateIdentifier {
            metadata: title
                .map(|t| BTreeMap::from([(ERC_WHAT.to_owned(), t.to_owned())])),
            location: locations,
        };
        self.registry
            .update_identifier(identifier, &request)
            .map_err(CoreError::Registration)
    }
}
