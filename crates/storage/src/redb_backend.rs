//! Persistent backend on redb.
//!
//! One table maps fingerprint → JSON-encoded entity-id list. Each logical
//! operation runs in its own redb transaction: read-only for `get` and
//! `serialize_all`, read-write for `put`. That gives per-key atomicity but
//! no cross-key transaction spanning a whole update batch.

use std::collections::BTreeSet;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use propstore_core::{Fingerprint, Result, Snapshot, StoreError};

use crate::backend::{backend_err, decode_ids, BackendKind, StoreBackend};

/// Fingerprint → JSON entity-id list.
const INDEX_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("prop_index");

/// Database file name inside the configured directory.
const DB_FILE: &str = "index.redb";

/// Embedded redb database holding one index.
#[derive(Debug)]
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open or create the database under `dir`.
    ///
    /// Fails with `Initialization` if the directory cannot be created or the
    /// database file cannot be opened (bad path, permission, lock held by
    /// another process).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            StoreError::Initialization(format!("create {}: {e}", dir.display()))
        })?;

        let path = dir.join(DB_FILE);
        let db = Database::create(&path)
            .map_err(|e| StoreError::Initialization(format!("open {}: {e}", path.display())))?;

        debug!(path = %path.display(), "opened redb backend");
        Ok(Self { db })
    }
}

impl StoreBackend for RedbBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redb
    }

    fn put(&self, fingerprint: &Fingerprint, entity_id: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut table = txn.open_table(INDEX_TABLE).map_err(backend_err)?;

            let existing = table
                .get(fingerprint.as_str())
                .map_err(backend_err)?
                .map(|guard| guard.value().to_vec());

            let mut ids = match existing {
                Some(raw) => decode_ids(&raw)?,
                None => Vec::new(),
            };

            if !ids.iter().any(|known| known == entity_id) {
                ids.push(entity_id.to_string());
                let encoded = serde_json::to_vec(&ids).map_err(backend_err)?;
                table
                    .insert(fingerprint.as_str(), encoded.as_slice())
                    .map_err(backend_err)?;
            }
        }
        txn.commit().map_err(backend_err)?;
        Ok(())
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<BTreeSet<String>> {
        let txn = self.db.begin_read().map_err(backend_err)?;
        // The table only exists once something has been written.
        let table = match txn.open_table(INDEX_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(BTreeSet::new()),
            Err(e) => return Err(backend_err(e)),
        };

        match table.get(fingerprint.as_str()).map_err(backend_err)? {
            Some(raw) => Ok(decode_ids(raw.value())?.into_iter().collect()),
            None => Ok(BTreeSet::new()),
        }
    }

    fn serialize_all(&self) -> Result<Snapshot> {
        let txn = self.db.begin_read().map_err(backend_err)?;
        let table = match txn.open_table(INDEX_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Snapshot::new()),
            Err(e) => return Err(backend_err(e)),
        };

        let mut snapshot = Snapshot::new();
        for entry in table.iter().map_err(backend_err)? {
            let (key, value) = entry.map_err(backend_err)?;
            for id in decode_ids(value.value())? {
                snapshot.insert(key.value(), id);
            }
        }
        Ok(snapshot)
    }

    fn shutdown(&self) -> Result<()> {
        // Commits are durable; nothing left to flush.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_backend() -> (TempDir, RedbBackend) {
        let dir = TempDir::new().unwrap();
        let backend = RedbBackend::open(dir.path()).unwrap();
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
    fn test_get_on_fresh_database_is_empty() {
        let (_dir, backend) = open_backend();
        let ids = backend.get(&Fingerprint::derive("num", "1.0")).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_serialize_all_on_fresh_database_is_empty() {
        let (_dir, backend) = open_backend();
        assert!(backend.serialize_all().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let fp = Fingerprint::derive("key1", "b");

        {
            let backend = RedbBackend::open(dir.path()).unwrap();
            backend.put(&fp, "m1").unwrap();
            backend.shutdown().unwrap();
        }

        let backend = RedbBackend::open(dir.path()).unwrap();
        assert!(backend.get(&fp).unwrap().contains("m1"));
    }

    #[test]
    fn test_open_rejects_bad_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"not a directory").unwrap();

        let err = RedbBackend::open(&file).unwrap_err();
        assert!(matches!(err, StoreError::Initialization(_)));
    }
}
