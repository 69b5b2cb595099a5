//! Update and query evaluation.
//!
//! An update batch maps each entity id to its properties:
//!
//! ```json
//! {"m1": {"num": "6.13", "strs": "a"}, "m2": {"num": "6.13"}}
//! ```
//!
//! which the engine turns into the inverted form the backends store:
//!
//! ```json
//! {"num:6.13": ["m1", "m2"], "strs:a": ["m1"]}
//! ```

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use propstore_core::{Fingerprint, Result};
use propstore_storage::StoreBackend;

/// Entity id → (property name → property value).
pub type UpdateBatch = HashMap<String, HashMap<String, String>>;

/// Property name → required value. All terms must match (AND).
pub type Predicate = HashMap<String, String>;

/// Index every property of every entity in the batch.
///
/// Not atomic across the batch: the first failing `put` is returned
/// immediately and earlier puts stay applied. Because `put` is idempotent,
/// retrying the whole batch after a failure is safe.
pub fn update(backend: &dyn StoreBackend, batch: &UpdateBatch) -> Result<()> {
    for (entity_id, properties) in batch {
        for (name, value) in properties {
            backend.put(&Fingerprint::derive(name, value), entity_id)?;
        }
    }
    Ok(())
}

/// Conjunctive (AND) query: entity ids matching every predicate term.
///
/// The running result is seeded with the first term's candidate set and
/// intersected with each subsequent set. Once the intersection is empty no
/// later term can add entities back, so evaluation short-circuits. An empty
/// predicate matches nothing; there is no implicit wildcard.
///
/// The returned list is sorted; order carries no semantics.
pub fn query(backend: &dyn StoreBackend, predicate: &Predicate) -> Result<Vec<String>> {
    let mut matched: Option<BTreeSet<String>> = None;

    for (name, value) in predicate {
        let fingerprint = Fingerprint::derive(name, value);
        let candidates = backend.get(&fingerprint)?;
        debug!(%fingerprint, candidates = candidates.len(), "query term");

        matched = Some(match matched {
            None => candidates,
            Some(current) => current.intersection(&candidates).cloned().collect(),
        });

        if matched.as_ref().is_some_and(BTreeSet::is_empty) {
            return Ok(Vec::new());
        }
    }

    Ok(matched.map(|ids| ids.into_iter().collect()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use propstore_storage::MemoryBackend;

    fn seeded_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        let batch: UpdateBatch = serde_json::from_str(
            r#"{"m1": {"num": "6.13", "strs": "a", "key1": "b"},
                "m2": {"num": "6.13", "key1": "bddd"},
                "m3": {"strs": "a", "key1": "b"},
                "m4": {"key1": "asdasdb"}}"#,
        )
        .unwrap();
        update(&backend, &batch).unwrap();
        backend
    }

    fn run(backend: &dyn StoreBackend, terms: &[(&str, &str)]) -> Vec<String> {
        let predicate: Predicate = terms
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        query(backend, &predicate).unwrap()
    }

    #[test]
    fn test_two_term_conjunction() {
        let backend = seeded_backend();
        assert_eq!(run(&backend, &[("num", "6.13"), ("strs", "a")]), vec!["m1"]);
    }

    #[test]
    fn test_single_term_multiple_matches() {
        let backend = seeded_backend();
        assert_eq!(run(&backend, &[("strs", "a")]), vec!["m1", "m3"]);
    }

    #[test]
    fn test_single_term_single_match() {
        let backend = seeded_backend();
        assert_eq!(run(&backend, &[("key1", "asdasdb")]), vec!["m4"]);
    }

    #[test]
    fn test_no_match_returns_empty() {
        let backend = seeded_backend();
        assert!(run(&backend, &[("num", "1.0")]).is_empty());
    }

    #[test]
    fn test_empty_term_zeroes_conjunction() {
        let backend = seeded_backend();
        // "strs"="a" alone matches m1 and m3; an unmatched term empties it.
        assert!(run(&backend, &[("strs", "a"), ("num", "1.0")]).is_empty());
    }

    #[test]
    fn test_empty_predicate_is_not_a_wildcard() {
        let backend = seeded_backend();
        assert!(run(&backend, &[]).is_empty());
    }

    #[test]
    fn test_query_normalizes_property_case() {
        let backend = seeded_backend();
        assert_eq!(run(&backend, &[("STRS", "A")]), vec!["m1", "m3"]);
    }

    #[test]
    fn test_update_twice_yields_same_results() {
        let backend = seeded_backend();
        let batch: UpdateBatch = serde_json::from_str(
            r#"{"m1": {"num": "6.13", "strs": "a", "key1": "b"}}"#,
        )
        .unwrap();
        update(&backend, &batch).unwrap();

        assert_eq!(run(&backend, &[("strs", "a")]), vec!["m1", "m3"]);
    }
}
