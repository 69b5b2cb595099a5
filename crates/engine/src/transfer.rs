//! Snapshot export and import.
//!
//! Export produces the canonical snapshot of a backend; import replays one
//! into a backend, entry by entry. Import is purely additive: it relies on
//! `put` idempotence, so re-importing a snapshot or importing overlapping
//! snapshots from different sources never removes entries and never errors
//! on duplicates. This is the transport used for backup, restore, and peer
//! aggregation.

use propstore_core::{Fingerprint, Result, Snapshot};
use propstore_storage::StoreBackend;

/// Full canonical export of a backend.
pub fn export(backend: &dyn StoreBackend) -> Result<Snapshot> {
    backend.serialize_all()
}

/// Replay every (fingerprint, entity id) pair of a snapshot into a backend.
///
/// Snapshot keys are already canonical and are preserved byte-for-byte.
pub fn import(backend: &dyn StoreBackend, snapshot: &Snapshot) -> Result<()> {
    for (fingerprint, ids) in snapshot.iter() {
        let fingerprint = Fingerprint::from_raw(fingerprint);
        for id in ids {
            backend.put(&fingerprint, id)?;
        }
    }
    Ok(())
}
