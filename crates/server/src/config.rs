//! Application configuration.
//!
//! Loaded from a TOML file at startup:
//!
//! ```toml
//! port = 8080
//!
//! [[stores]]
//! name = "machines"
//! aggregate_peers = ["http://other:8080/v1/store/machines"]
//! sync_interval_seconds = 60
//!
//! [stores.backup]
//! kind = "sled"
//! directory = "./data/machines"
//! ```
//!
//! The primary backend of every store is volatile; `backup` selects an
//! optional second backend that makes the store durable across restarts.

use std::path::Path;

use serde::Deserialize;

use propstore_core::{Result, StoreError};
use propstore_storage::BackendOptions;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Top-level process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// TCP port the HTTP server binds.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Stores hosted by this process.
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

/// Declaration of one named store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store name, addressed as `/v1/store/{name}/...`.
    pub name: String,
    /// Optional persistent backup backend mirrored behind the primary.
    #[serde(default)]
    pub backup: Option<BackendOptions>,
    /// Peer store endpoints to pull snapshots from, e.g.
    /// `http://host:8080/v1/store/machines`.
    #[serde(default)]
    pub aggregate_peers: Vec<String>,
    /// Seconds between aggregation pulls. Only meaningful with peers.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

impl AppConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Configuration(format!("read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(raw).map_err(|e| StoreError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for store in &self.stores {
            if store.name.is_empty() {
                return Err(StoreError::Configuration("store name is empty".to_string()));
            }
            if !seen.insert(store.name.as_str()) {
                return Err(StoreError::Configuration(format!(
                    "duplicate store name: {}",
                    store.name
                )));
            }
            if !store.aggregate_peers.is_empty() && store.sync_interval_seconds == 0 {
                return Err(StoreError::Configuration(format!(
                    "store {} declares peers with a zero sync interval",
                    store.name
                )));
            }
        }
        Ok(())
    }
}
