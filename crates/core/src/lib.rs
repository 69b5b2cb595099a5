//! Core types for the property index.
//!
//! This crate defines the vocabulary shared by every layer:
//! - `Fingerprint`: the canonical index key derived from a property
//! - `Snapshot`: the full external representation of an index
//! - `StoreError` / `Result`: the error taxonomy

pub mod error;
pub mod fingerprint;
pub mod snapshot;

pub use error::{Result, StoreError};
pub use fingerprint::Fingerprint;
pub use snapshot::Snapshot;
