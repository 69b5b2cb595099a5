//! Volatile in-memory backend.
//!
//! The entire map sits behind a single reader/writer lock: reads take the
//! shared lock, writes the exclusive lock. Contents are lost on restart;
//! durability comes from an optional persistent backup backend configured
//! alongside this one.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use propstore_core::{Fingerprint, Result, Snapshot};

use crate::backend::{BackendKind, StoreBackend};

/// Lock-protected fingerprint → entity-id-set map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    index: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryBackend {
    /// Allocate an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fingerprints currently indexed.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

impl StoreBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn put(&self, fingerprint: &Fingerprint, entity_id: &str) -> Result<()> {
        let mut index = self.index.write();
        index
            .entry(fingerprint.as_str().to_string())
            .or_default()
            .insert(entity_id.to_string());
        Ok(())
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<BTreeSet<String>> {
        let index = self.index.read();
        Ok(index.get(fingerprint.as_str()).cloned().unwrap_or_default())
    }

    fn serialize_all(&self) -> Result<Snapshot> {
        let index = self.index.read();
        let mut snapshot = Snapshot::new();
        for (fingerprint, ids) in index.iter() {
            for id in ids {
                snapshot.insert(fingerprint.clone(), id.clone());
            }
        }
        Ok(snapshot)
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
