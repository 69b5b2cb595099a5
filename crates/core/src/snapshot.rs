//! Full-index snapshots.
//!
//! A snapshot is the canonical external representation of an entire index:
//! fingerprint mapped to a list of entity ids. It is the payload for backup,
//! restore, and peer aggregation. List order carries no semantics, but the
//! canonical form keeps keys and ids sorted so equal indexes serialize to
//! identical JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical export of an index: fingerprint → entity-id list.
///
/// Merging snapshots is an append-only union: associative, commutative, and
/// idempotent. Entity ids are never removed by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, Vec<String>>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fingerprints in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the snapshot holds no fingerprints.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an entity id under a fingerprint, ignoring duplicates.
    ///
    /// The id list stays sorted, keeping the snapshot canonical.
    pub fn insert(&mut self, fingerprint: impl Into<String>, entity_id: impl Into<String>) {
        let ids = self.entries.entry(fingerprint.into()).or_default();
        let id = entity_id.into();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
    }

    /// Entity ids recorded for a fingerprint, if any.
    pub fn get(&self, fingerprint: &str) -> Option<&[String]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Iterate over (fingerprint, entity-id list) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Append-only union with another snapshot.
    ///
    /// Merge order never changes the result: for every fingerprint the
    /// resulting id set is the union of both sides.
    pub fn merge(&mut self, other: &Snapshot) {
        for (fingerprint, ids) in &other.entries {
            for id in ids {
                self.insert(fingerprint.clone(), id.clone());
            }
        }
    }
}

impl FromIterator<(String, Vec<String>)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (fingerprint, ids) in iter {
            for id in ids {
                snapshot.insert(fingerprint.clone(), id);
            }
        }
        snapshot
    }
}
