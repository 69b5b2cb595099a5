//! Storage backends for the property index.
//!
//! Every backend implements the same `StoreBackend` capability surface, so
//! the engine above is backend-agnostic:
//! - `MemoryBackend`: volatile, a single reader/writer lock around a map
//! - `RedbBackend`: persistent, one redb transaction per logical operation
//! - `SledBackend`: persistent, one sled transaction per write
//!
//! Backends are selected by a configuration-driven factory, `open_backend`.

pub mod backend;
pub mod memory;
pub mod redb_backend;
pub mod sled_backend;

pub use backend::{open_backend, BackendKind, BackendOptions, StoreBackend};
pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;
pub use sled_backend::SledBackend;
