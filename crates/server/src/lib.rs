//! HTTP surface and process wiring for propstore.
//!
//! A server hosts a set of named stores declared in configuration. Each
//! store is a `{primary, optional backup}` backend pair, owned by an
//! `AppContext` that is built once at startup and handed to request
//! handlers by reference. Stores with configured peers additionally own one
//! background aggregation task.

pub mod config;
pub mod context;
pub mod routes;
pub mod sync;

pub use config::{AppConfig, StoreConfig};
pub use context::{AppContext, StorePair};
pub use routes::router;
pub use sync::{AggregateSync, SyncHandle, SyncState};
