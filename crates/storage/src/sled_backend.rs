//! Persistent backend on sled.
//!
//! The default tree maps fingerprint → JSON-encoded entity-id list. `put`
//! runs inside a sled transaction so the read-merge-write of one key is
//! atomic under concurrent writers. `shutdown` flushes outstanding writes;
//! file handles are released when the backend drops.

use std::collections::BTreeSet;
use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use tracing::debug;

use propstore_core::{Fingerprint, Result, Snapshot, StoreError};

use crate::backend::{backend_err, decode_ids, BackendKind, StoreBackend};

/// Embedded sled database holding one index.
#[derive(Debug)]
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open or create the database under `dir`.
    ///
    /// Fails with `Initialization` if the directory cannot be opened or is
    /// locked by another process.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let db = sled::Config::default()
            .path(dir)
            .open()
            .map_err(|e| StoreError::Initialization(format!("open {}: {e}", dir.display())))?;

        debug!(path = %dir.display(), "opened sled backend");
        Ok(Self { db })
    }
}

impl StoreBackend for SledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sled
    }

    fn put(&self, fingerprint: &Fingerprint, entity_id: &str) -> Result<()> {
        let key = fingerprint.as_str().as_bytes();

        let outcome = self.db.transaction(|tx| {
            let mut ids = match tx.get(key)? {
                Some(raw) => decode_ids(&raw).map_err(ConflictableTransactionError::Abort)?,
                None => Vec::new(),
            };

            if !ids.iter().any(|known| known == entity_id) {
                ids.push(entity_id.to_string());
                let encoded = serde_json::to_vec(&ids)
                    .map_err(|e| ConflictableTransactionError::Abort(backend_err(e)))?;
                tx.insert(key, encoded)?;
            }
            Ok(())
        });

        match outcome {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(backend_err(err)),
        }
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<BTreeSet<String>> {
        match self.db.get(fingerprint.as_str()).map_err(backend_err)? {
            Some(raw) => Ok(decode_ids(&raw)?.into_iter().collect()),
            None => Ok(BTreeSet::new()),
        }
    }

    fn serialize_all(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        for entry in self.db.iter() {
            let (key, value) = entry.map_err(backend_err)?;
            let fingerprint = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Backend(format!("non-utf8 fingerprint: {e}")))?;
            for id in decode_ids(&value)? {
                snapshot.insert(fingerprint.clone(), id);
            }
        }
        Ok(snapshot)
    }

    fn shutdown(&self) -> Result<()> {
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_backend() -> (TempDir, SledBackend) {
        let dir = TempDir::new().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_put_and_get() {
        let (_dir, backend) = open_backend();
        let fp = Fingerprint::derive("num", "6.13");

        backend.put(&fp, "m1").unwrap();
        backend.put(&fp, "m2").unwrap();

        let ids = backend.get(&fp).unwrap();
        assert!(ids.contains("m1"));
        assert!(ids.contains("m2"));
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_dir, backend) = open_backend();
        let fp = Fingerprint::derive("strs", "a");

        backend.put(&fp, "m1").unwrap();
        backend.put(&fp, "m1").unwrap();

        assert_eq!(backend.get(&fp).unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_fingerprint_is_empty() {
        let (_dir, backend) = open_backend();
        assert!(backend.get(&Fingerprint::derive("num", "1.0")).unwrap().is_empty());
    }

    #[test]
    fn test_serialize_all_sorted() {
        let (_dir, backend) = open_backend();
        backend.put(&Fingerprint::derive("num", "6.13"), "m2").unwrap();
        backend.put(&Fingerprint::derive("num", "6.13"), "m1").unwrap();

        let snapshot = backend.serialize_all().unwrap();
        assert_eq!(
            snapshot.get("num:6.13"),
            Some(&["m1".to_string(), "m2".to_string()][..])
        );
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let fp = Fingerprint::derive("key1", "b");

        {
            let backend = SledBackend::open(dir.path()).unwrap();
            backend.put(&fp, "m1").unwrap();
            backend.shutdown().unwrap();
        }

        let backend = SledBackend::open(dir.path()).unwrap();
        assert!(backend.get(&fp).unwrap().contains("m1"));
    }

    #[test]
    fn test_concurrent_puts_same_key() {
        use std::sync::Arc;
        use std::thread;

        let dir = TempDir::new().unwrap();
        let backend = Arc::new(SledBackend::open(dir.path()).unwrap());
        let fp = Fingerprint::derive("shared", "prop");

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let backend = Arc::clone(&backend);
                let fp = fp.clone();
                thread::spawn(move || {
                    for i in 0..20 {
                        backend.put(&fp, &format!("m{worker}-{i}")).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backend.get(&fp).unwrap().len(), 80);
    }
}
