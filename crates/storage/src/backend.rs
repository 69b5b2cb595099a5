//! Backend capability surface and configuration-driven factory.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use propstore_core::{Fingerprint, Result, Snapshot, StoreError};

use crate::memory::MemoryBackend;
use crate::redb_backend::RedbBackend;
use crate::sled_backend::SledBackend;

/// Uniform capability surface implemented by every backend variant.
///
/// Initialization is the variant's constructor (`MemoryBackend::new`,
/// `RedbBackend::open`, `SledBackend::open`); everything after that goes
/// through this trait, which is the only path allowed to mutate index state.
///
/// # Thread Safety
///
/// Implementations are `Send + Sync`; `put` is linearizable with respect to
/// `get` and `serialize_all` under the backend's own lock or transaction
/// discipline.
pub trait StoreBackend: Send + Sync + fmt::Debug {
    /// Which variant this backend is, for logging.
    fn kind(&self) -> BackendKind;

    /// Idempotently add an entity id to the set stored for a fingerprint.
    ///
    /// A second call with the same arguments is a no-op.
    fn put(&self, fingerprint: &Fingerprint, entity_id: &str) -> Result<()>;

    /// The current entity-id set for a fingerprint.
    ///
    /// A fingerprint with no entries returns an empty set.
    fn get(&self, fingerprint: &Fingerprint) -> Result<BTreeSet<String>>;

    /// A full, point-in-time view of the index.
    fn serialize_all(&self) -> Result<Snapshot>;

    /// Flush durable state. No-op for the volatile variant.
    ///
    /// File handles are released when the backend is dropped, so skipping
    /// shutdown on an already-durable backend cannot corrupt it.
    fn shutdown(&self) -> Result<()>;
}

/// Backend variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-memory map, lock-protected. Contents are lost on restart.
    Memory,
    /// Embedded redb database, durable on commit.
    Redb,
    /// Embedded sled database, durable on flush.
    Sled,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::Redb => f.write_str("redb"),
            BackendKind::Sled => f.write_str("sled"),
        }
    }
}

/// Configuration for opening one backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendOptions {
    /// Which variant to open.
    pub kind: BackendKind,
    /// On-disk directory for persistent variants. Ignored by `Memory`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl BackendOptions {
    /// Options for a volatile in-memory backend.
    pub fn memory() -> Self {
        BackendOptions { kind: BackendKind::Memory, directory: None }
    }
}

/// Open the backend described by `options`.
///
/// Persistent kinds require a directory; a missing one is a configuration
/// error rather than an initialization error because nothing was opened.
pub fn open_backend(options: &BackendOptions) -> Result<Box<dyn StoreBackend>> {
    match options.kind {
        BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendKind::Redb => {
            let dir = require_directory(options)?;
            Ok(Box::new(RedbBackend::open(dir)?))
        }
        BackendKind::Sled => {
            let dir = require_directory(options)?;
            Ok(Box::new(SledBackend::open(dir)?))
        }
    }
}

fn require_directory(options: &BackendOptions) -> Result<&PathBuf> {
    options.directory.as_ref().ok_or_else(|| {
        StoreError::Configuration(format!(
            "backend kind {} requires a directory",
            options.kind
        ))
    })
}

/// Map any engine-level failure into a `Backend` error.
pub(crate) fn backend_err(err: impl fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Decode the JSON-encoded entity-id list stored under a fingerprint.
pub(crate) fn decode_ids(raw: &[u8]) -> Result<Vec<String>> {
    serde_json::from_slice(raw)
        .map_err(|e| StoreError::Backend(format!("corrupt entity-id list: {e}")))
}
