//! Manifest-driven batch registration.
//!
//! Entries are processed sequentially in manifest order. Per-entry
//! registration failures are collected and iteration continues; a manifest
//! that cannot be parsed aborts the whole batch. Between entries the
//! orchestrator checks the interrupt flag and stops cleanly.

use crate::client::{MinidClient, RegisterOptions};
use crate::concurrency::interrupted;
use crate::CoreError;
use minid_schema::read_manifest_entries;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// One entry that failed to register.
#[derive(Debug, Serialize)]
pub struct BatchFailure {
    /// Zero-based position in the manifest.
    pub index: usize,
    pub filename: Option<String>,
    #[serde(serialize_with = "error_message")]
    pub error: CoreError,
}

fn error_message<S: serde::Serializer>(error: &CoreError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Outcome of a batch run.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    /// Identifiers minted during this run.
    pub created: usize,
    /// Entries matched against already-registered identifiers.
    pub matched: usize,
    pub failures: Vec<BatchFailure>,
    /// True when the run stopped early on an interrupt.
    pub interrupted: bool,
}

impl BatchReport {
    /// Entries this run actually attempted.
    pub fn processed(&self) -> usize {
        self.created + self.matched + self.failures.len()
    }
}

impl MinidClient {
    /// Register every entry of a manifest, deduplicating each against the
    /// registry. Entry failures are collected; parse failures abort.
    pub fn batch_register(
        &self,
        manifest_path: &Path,
        options: &RegisterOptions,
    ) -> Result<BatchReport, CoreError> {
        let mut report = BatchReport::default();
        for (index, entry) in read_manifest_entries(manifest_path)?.enumerate() {
            if interrupted() {
                debug!("batch interrupted after {} entries", report.processed());
                report.interrupted = true;
                break;
            }
            let entry = entry?;
            let filename = entry.filename.clone();
            match self.get_or_register(&entry, options) {
                Ok(outcome) if outcome.created => report.created += 1,
                Ok(_) => report.matched += 1,
                Err(error) => {
                    warn!(
                        "entry {index} ({}) failed: {error}",
                        filename.as_deref().unwrap_or("<unnamed>")
                    );
                    report.failures.push(BatchFailure {
                        index,
                        filename,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }
}
