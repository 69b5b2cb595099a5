//! Background aggregation of peer stores.
//!
//! A store configured with peers owns one task that periodically pulls each
//! peer's backup snapshot and merges it locally, giving best-effort eventual
//! consistency across independently deployed instances. A peer failure of
//! any kind only delays convergence; it never blocks or fails the owning
//! store. The merge is append-only union: ids removed at a peer are never
//! removed locally.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use propstore_core::{Result, Snapshot, StoreError};

use crate::context::StorePair;

/// Upper bound on one peer pull, so a stalled peer cannot push convergence
/// past the next scheduled tick.
const PEER_TIMEOUT_CEILING: Duration = Duration::from_secs(5);

/// Lifecycle of the aggregation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Ticking and pulling peers.
    Running,
    /// Shutdown observed; no further ticks will be processed.
    Stopping,
    /// Task exited.
    Stopped,
}

/// Handle owned by the store registry: signals shutdown and exposes state.
pub struct SyncHandle {
    shutdown: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
    state: Arc<RwLock<SyncState>>,
}

impl SyncHandle {
    /// Current task state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Signal shutdown and wait for the task to exit.
    ///
    /// The signal wins over a pending tick; an in-flight cycle is not
    /// awaited beyond the task noticing the signal at its next select.
    pub async fn stop(self) {
        let _ = self.shutdown.send(()).await;
        let _ = self.task.await;
    }
}

/// The periodic pull-and-merge worker for one store.
pub struct AggregateSync {
    store: Arc<StorePair>,
    peers: Vec<String>,
    period: Duration,
    client: reqwest::Client,
    state: Arc<RwLock<SyncState>>,
}

impl AggregateSync {
    /// Start the aggregation task for a store.
    ///
    /// The first pull happens one full period after startup; ticks missed
    /// while a cycle runs long are skipped, not replayed.
    pub fn spawn(
        store: Arc<StorePair>,
        peers: Vec<String>,
        period: Duration,
    ) -> Result<SyncHandle> {
        let client = reqwest::Client::builder()
            .timeout(period.min(PEER_TIMEOUT_CEILING))
            .build()
            .map_err(|e| StoreError::Initialization(format!("http client: {e}")))?;

        let state = Arc::new(RwLock::new(SyncState::Running));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = AggregateSync {
            store,
            peers,
            period,
            client,
            state: Arc::clone(&state),
        };
        info!(
            store = %worker.store.name(),
            peers = worker.peers.len(),
            interval_secs = period.as_secs(),
            "aggregation task started"
        );
        let task = tokio::spawn(worker.run(shutdown_rx));

        Ok(SyncHandle { shutdown: shutdown_tx, task, state })
    }

    async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Shutdown always beats a tick that became ready in the
                // same poll; recv() also resolves when the handle drops.
                biased;
                _ = shutdown.recv() => {
                    *self.state.write() = SyncState::Stopping;
                    break;
                }
                _ = ticker.tick() => {
                    self.pull_all_peers().await;
                }
            }
        }

        *self.state.write() = SyncState::Stopped;
        info!(store = %self.store.name(), "aggregation task stopped");
    }

    async fn pull_all_peers(&self) {
        for peer in &self.peers {
            match self.pull_peer(peer).await {
                Ok(merged) => {
                    debug!(store = %self.store.name(), peer, fingerprints = merged,
                           "merged peer snapshot");
                }
                Err(err) => {
                    warn!(store = %self.store.name(), peer, error = %err,
                          "peer pull failed; skipping until next tick");
                }
            }
        }
    }

    /// Pull one peer's backup and merge it into the local store.
    async fn pull_peer(&self, peer: &str) -> Result<usize> {
        let url = format!("{}/backup", peer.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Network(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let snapshot: Snapshot = response
            .json()
            .await
            .map_err(|e| StoreError::MalformedInput(e.to_string()))?;

        self.store.restore(&snapshot)?;
        Ok(snapshot.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn local_pair() -> Arc<StorePair> {
        StorePair::open(&StoreConfig {
            name: "local".to_string(),
            backup: None,
            aggregate_peers: Vec::new(),
            sync_interval_seconds: 1,
        })
    }

    #[tokio::test]
    async fn test_spawn_starts_running() {
        let handle = AggregateSync::spawn(
            local_pair(),
            vec!["http://127.0.0.1:1/v1/store/local".to_string()],
            Duration::from_secs(60),
        )
        .unwrap();

        assert_eq!(handle.state(), SyncState::Running);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_reaches_stopped_before_first_tick() {
        let handle = AggregateSync::spawn(
            local_pair(),
            vec!["http://127.0.0.1:1/v1/store/local".to_string()],
            Duration::from_secs(60),
        )
        .unwrap();

        let state = Arc::clone(&handle.state);
        handle.stop().await;
        assert_eq!(*state.read(), SyncState::Stopped);
    }

    #[tokio::test]
    async fn test_unreachable_peer_does_not_kill_task() {
        let handle = AggregateSync::spawn(
            local_pair(),
            // Nothing listens here; every pull fails.
            vec!["http://127.0.0.1:1/v1/store/local".to_string()],
            Duration::from_millis(20),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(handle.state(), SyncState::Running);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_task() {
        let handle = AggregateSync::spawn(
            local_pair(),
            vec!["http://127.0.0.1:1/v1/store/local".to_string()],
            Duration::from_secs(60),
        )
        .unwrap();

        let state = Arc::clone(&handle.state);
        drop(handle);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*state.read(), SyncState::Stopped);
    }
}
