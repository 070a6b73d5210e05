//! Work records and the injected storage collaborators.
//!
//! The pipeline itself only needs three capabilities from the outside
//! world: a key-value store for per-owner work records, an object sink
//! for generated artifacts, and a fire-and-forget trigger for the
//! downstream build pipeline. They are all injected as trait objects;
//! [`memory`] provides in-process backends for tests.

pub mod memory;

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A per-owner unit of pending work, gated by a ready flag.
///
/// A record is created by the intake stage with `ready = true` and
/// consumed exactly once by the batch pipeline, which flips the flag.
/// The revision counter is maintained by the record store and guards
/// the flip against concurrent batch invocations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    /// The owner this work belongs to; also the artifact key prefix.
    pub owner_id: String,
    /// The generated display names, in model output order.
    pub items: Vec<String>,
    /// Whether this record is pending batch processing.
    pub ready: bool,
    /// Store-maintained revision, bumped on every write.
    #[serde(default)]
    pub revision: u64,
}

impl WorkRecord {
    /// Creates a fresh, ready record for the given owner.
    pub fn new(owner_id: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            items,
            ready: true,
            revision: 0,
        }
    }
}

/// The error type for record and object stores.
#[derive(Debug)]
pub enum StoreError {
    /// The requested record or object does not exist.
    NotFound(String),
    /// A compare-and-swap write lost against a concurrent writer.
    RevisionConflict {
        /// The owner whose record was contested.
        owner_id: String,
        /// The revision the writer expected to find.
        expected: u64,
    },
    /// The backing service failed.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(key) => write!(f, "`{key}` not found"),
            StoreError::RevisionConflict { owner_id, expected } => write!(
                f,
                "record for `{owner_id}` was modified concurrently \
                 (expected revision {expected})"
            ),
            StoreError::Backend(message) => write!(f, "backend: {message}"),
        }
    }
}

impl Error for StoreError {}

/// A key-value store holding one [`WorkRecord`] per owner.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every record whose ready flag is set, in a stable order.
    async fn scan_ready(&self) -> Result<Vec<WorkRecord>, StoreError>;

    /// Writes a record, replacing any prior record for the same owner.
    ///
    /// With `expected_revision` set, the write only succeeds if the
    /// stored record currently carries exactly that revision; otherwise
    /// it fails with [`StoreError::RevisionConflict`]. A fresh record
    /// has revision 0 until its first write. The stored revision is
    /// bumped on every successful write.
    async fn put(
        &self,
        record: WorkRecord,
        expected_revision: Option<u64>,
    ) -> Result<(), StoreError>;
}

/// An object sink for generated artifacts, keyed by slash-separated
/// paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the bytes under the given key, overwriting silently.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError>;

    /// Fetches the bytes stored under the given key.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;
}

/// A fire-and-forget trigger for a downstream pipeline.
///
/// No return value is consumed by the core; implementations log their
/// own failures.
#[async_trait]
pub trait PipelineTrigger: Send + Sync {
    /// Requests a run of the named pipeline.
    async fn start(&self, pipeline: &str);
}
