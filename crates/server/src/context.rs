//! Store registry: explicit ownership of every store's backend pair.
//!
//! The context replaces any process-wide mutable store with an explicit
//! name → `StorePair` mapping, constructed once at startup and shared with
//! request handlers through server state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use propstore_core::{Result, Snapshot, StoreError};
use propstore_engine::{export, import, query, update, Predicate, UpdateBatch};
use propstore_storage::{open_backend, MemoryBackend, StoreBackend};

use crate::config::{AppConfig, StoreConfig};
use crate::sync::{AggregateSync, SyncHandle};

/// One named store: a volatile primary and an optional persistent backup.
///
/// The primary serves every read; the backup is a durable mirror. All
/// mutations of index state go through this type.
pub struct StorePair {
    name: String,
    primary: Arc<dyn StoreBackend>,
    backup: Option<Arc<dyn StoreBackend>>,
}

impl StorePair {
    /// Open the backends declared for one store.
    ///
    /// A backup that fails to open degrades the store to primary-only
    /// rather than failing startup. A backup that opens is exported and
    /// imported into the primary, restoring state from the previous run.
    pub fn open(config: &StoreConfig) -> Arc<Self> {
        info!(store = %config.name, "initializing primary memory store");
        let primary: Arc<dyn StoreBackend> = Arc::new(MemoryBackend::new());

        let backup = config.backup.as_ref().and_then(|options| {
            info!(store = %config.name, kind = %options.kind, "initializing backup store");
            match open_backend(options) {
                Ok(backend) => Some(Arc::<dyn StoreBackend>::from(backend)),
                Err(err) => {
                    warn!(store = %config.name, error = %err, "backup unavailable; store runs without it");
                    None
                }
            }
        });

        if let Some(backup) = &backup {
            match export(backup.as_ref()).and_then(|snapshot| import(primary.as_ref(), &snapshot)) {
                Ok(()) => {}
                Err(err) => {
                    warn!(store = %config.name, error = %err, "failed to seed primary from backup")
                }
            }
        }

        Arc::new(StorePair { name: config.name.clone(), primary, backup })
    }

    /// Store name as declared in configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index an update batch.
    ///
    /// The primary is authoritative: its error is the caller's error. The
    /// backup is mirrored best-effort; a mirror failure is logged, never
    /// surfaced, and the next aggregation or restore heals it.
    pub fn update(&self, batch: &UpdateBatch) -> Result<()> {
        update(self.primary.as_ref(), batch)?;
        if let Some(backup) = &self.backup {
            if let Err(err) = update(backup.as_ref(), batch) {
                warn!(store = %self.name, error = %err, "backup mirror of update failed");
            }
        }
        Ok(())
    }

    /// Conjunctive query against the primary.
    pub fn query(&self, predicate: &Predicate) -> Result<Vec<String>> {
        query(self.primary.as_ref(), predicate)
    }

    /// Full snapshot of the primary.
    pub fn export(&self) -> Result<Snapshot> {
        export(self.primary.as_ref())
    }

    /// Merge a snapshot into the primary and the backup.
    ///
    /// Purely additive; used by the restore route and by aggregation.
    pub fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        import(self.primary.as_ref(), snapshot)?;
        if let Some(backup) = &self.backup {
            if let Err(err) = import(backup.as_ref(), snapshot) {
                warn!(store = %self.name, error = %err, "backup mirror of restore failed");
            }
        }
        Ok(())
    }

    /// Release both backends. Safe to call once per store; failures are
    /// logged because nothing above can act on them during shutdown.
    pub fn shutdown(&self) {
        if let Err(err) = self.primary.shutdown() {
            warn!(store = %self.name, error = %err, "primary shutdown failed");
        }
        if let Some(backup) = &self.backup {
            if let Err(err) = backup.shutdown() {
                warn!(store = %self.name, error = %err, "backup shutdown failed");
            }
        }
    }
}

/// A hosted store plus its aggregation task, if peers are configured.
pub struct StoreHandle {
    pair: Arc<StorePair>,
    sync: Mutex<Option<SyncHandle>>,
}

/// Everything the request handlers need: the store registry.
pub struct AppContext {
    stores: HashMap<String, StoreHandle>,
}

impl AppContext {
    /// Build the registry from configuration and start aggregation tasks.
    ///
    /// Must run inside a tokio runtime when any store declares peers.
    /// Configuration errors are fatal; a sync task that fails to start
    /// degrades that store to local-only operation.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut stores = HashMap::new();
        for store_config in &config.stores {
            let pair = StorePair::open(store_config);

            let sync = if store_config.aggregate_peers.is_empty() {
                None
            } else {
                let period = Duration::from_secs(store_config.sync_interval_seconds);
                match AggregateSync::spawn(
                    Arc::clone(&pair),
                    store_config.aggregate_peers.clone(),
                    period,
                ) {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        warn!(store = %store_config.name, error = %err,
                              "aggregation unavailable; store runs without sync");
                        None
                    }
                }
            };

            stores.insert(
                store_config.name.clone(),
                StoreHandle { pair, sync: Mutex::new(sync) },
            );
        }
        Ok(AppContext { stores })
    }

    /// Look up a declared store.
    pub fn store(&self, name: &str) -> Result<&Arc<StorePair>> {
        self.stores
            .get(name)
            .map(|handle| &handle.pair)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    /// Names of all hosted stores.
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    /// Stop aggregation tasks, then shut down every store's backends.
    pub async fn shutdown(&self) {
        for (name, handle) in &self.stores {
            let sync = handle.sync.lock().take();
            if let Some(sync) = sync {
                info!(store = %name, "stopping aggregation task");
                sync.stop().await;
            }
            handle.pair.shutdown();
        }
    }
}
