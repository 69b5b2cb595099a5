//! Index engine: property updates, conjunctive queries, snapshot transfer.
//!
//! The engine is stateless; every function operates on a `StoreBackend`
//! reference, so the same code path serves all backend variants.

pub mod index;
pub mod transfer;

pub use index::{query, update, Predicate, UpdateBatch};
pub use transfer::{export, import};
