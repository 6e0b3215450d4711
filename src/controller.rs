//! Connection Controller
//!
//! Orchestrates connect/disconnect of registered credentials against a
//! `DriveGateway`, drives the credential state machine and holds the last
//! good drive tree snapshot per credential.
//!
//! Locks are taken in the order store -> snapshots -> flights and are never
//! held while the gateway is awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

use crate::credential_store::{
    ConnectionState, CredentialId, CredentialStore, CredentialSummary, NewCredential,
};
use crate::error::{CatalogError, CatalogResult};
use crate::flatten::{flatten_tree, DEFAULT_MAX_DEPTH};
use crate::gateway::{DriveGateway, DriveTree, GatewayCredential, GatewayError};
use crate::record::FileRecord;

/// Default bound on a single `fetch_tree` call
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============ Snapshot ============

/// The result of one successful fetch. Replaced as a whole, never patched.
#[derive(Debug)]
pub struct Snapshot {
    pub tree: Arc<DriveTree>,
    pub fetched_at: DateTime<Utc>,
    files: CatalogResult<Vec<FileRecord>>,
    visible: DriveTree,
}

impl Snapshot {
    pub(crate) fn new(id: CredentialId, tree: DriveTree, max_depth: usize) -> Self {
        let files = flatten_tree(&tree, id, max_depth);
        let visible = tree.without_reserved(max_depth);
        Self {
            tree: Arc::new(tree),
            fetched_at: Utc::now(),
            files,
            visible,
        }
    }

    /// The tree as shown to users: reserved containers hidden, cut at the
    /// traversal depth limit.
    pub fn visible_tree(&self) -> &DriveTree {
        &self.visible
    }

    /// Flattened records, or the traversal error of this tree.
    pub fn files(&self) -> Result<&[FileRecord], &CatalogError> {
        self.files.as_deref()
    }
}

/// A credential together with whatever snapshot it currently holds.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub credential: CredentialSummary,
    pub snapshot: Option<Arc<Snapshot>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisconnectAllReport {
    pub disconnected: Vec<CredentialId>,
    /// Credentials whose in-flight fetch was cancelled before disconnecting
    pub cancelled_in_flight: Vec<CredentialId>,
}

/// Handle on the fetch currently running for one credential.
#[derive(Clone, Default)]
struct Flight {
    cancel: Arc<Notify>,
    /// Held by the fetch until its outcome is recorded in the store
    done: Arc<Mutex<()>>,
}

// ============ Controller ============

pub struct ConnectionController {
    /// Label of the owner this controller acts for, carried by every log line
    owner: String,
    gateway: Arc<dyn DriveGateway>,
    store: RwLock<CredentialStore>,
    snapshots: RwLock<HashMap<CredentialId, Arc<Snapshot>>>,
    flights: RwLock<HashMap<CredentialId, Flight>>,
    connect_timeout: Duration,
    max_depth: usize,
}

impl ConnectionController {
    pub fn new(owner: impl Into<String>, gateway: Arc<dyn DriveGateway>) -> Self {
        Self {
            owner: owner.into(),
            gateway,
            store: RwLock::new(CredentialStore::new()),
            snapshots: RwLock::new(HashMap::new()),
            flights: RwLock::new(HashMap::new()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    // ---- credential CRUD ----

    pub async fn register(&self, new: NewCredential) -> CatalogResult<CredentialSummary> {
        let summary = self.store.write().await.register(new)?;
        info!("[{}] Registered source {} via {}", self.owner, summary.title, self.gateway.name());
        Ok(summary)
    }

    pub async fn list(&self) -> Vec<CredentialSummary> {
        self.store.read().await.list()
    }

    pub async fn get(&self, id: CredentialId) -> CatalogResult<CredentialSummary> {
        self.store.read().await.get(id).map(|c| c.summary())
    }

    pub async fn state(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.store.read().await.state(id)
    }

    pub async fn rename(&self, id: CredentialId, title: &str) -> CatalogResult<CredentialSummary> {
        let summary = self.store.write().await.rename(id, title)?;
        info!("[{}] Renamed source {} to {}", self.owner, id, summary.title);
        Ok(summary)
    }

    /// Force a disconnect, then delete the credential.
    ///
    /// A fetch in flight is cancelled first.
    pub async fn remove(&self, id: CredentialId) -> CatalogResult<CredentialSummary> {
        loop {
            self.force_disconnect(id).await?;
            let mut store = self.store.write().await;
            // A connect may have slipped in between
            if store.state(id)? != ConnectionState::Disconnected {
                continue;
            }
            let removed = store.delete(id)?;
            self.snapshots.write().await.remove(&id);
            self.flights.write().await.remove(&id);
            info!("[{}] Removed source {}", self.owner, removed.title);
            return Ok(removed.summary());
        }
    }

    // ---- connection lifecycle ----

    /// Fetch the credential's tree and install it as the new snapshot.
    ///
    /// A credential already Connecting or Connected is left alone and its
    /// current state returned. On failure the previous snapshot stays.
    pub async fn connect(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.fetch(id, false).await
    }

    /// Re-fetch a credential even when it is Connected.
    ///
    /// A failed refresh leaves the credential Failed with its previous
    /// snapshot still in place.
    pub async fn refresh(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        self.fetch(id, true).await
    }

    async fn fetch(&self, id: CredentialId, refresh: bool) -> CatalogResult<ConnectionState> {
        let (credential, cancel, _done) = {
            let mut store = self.store.write().await;
            let current = store.state(id)?;
            let busy = match current {
                ConnectionState::Connecting => true,
                ConnectionState::Connected => !refresh,
                _ => false,
            };
            if busy {
                debug!("[{}] Fetch for {} ignored: already {}", self.owner, id, current);
                return Ok(current);
            }
            store.update_state(id, ConnectionState::Connecting)?;

            let flight = Flight::default();
            let done = flight.done.clone().lock_owned().await;
            let cancel = flight.cancel.clone();
            self.flights.write().await.insert(id, flight);
            (GatewayCredential::from(store.get(id)?), cancel, done)
        };

        info!("[{}] Connecting {} via {}", self.owner, credential.title, self.gateway.name());
        let fetch = tokio::time::timeout(self.connect_timeout, self.gateway.fetch_tree(&credential));
        let outcome = tokio::select! {
            outcome = fetch => outcome,
            _ = cancel.notified() => {
                self.store.write().await.update_state(id, ConnectionState::Failed)?;
                info!("[{}] Fetch for {} cancelled", self.owner, credential.title);
                return Err(CatalogError::ConnectionCancelled { id });
            }
        };

        let error = match outcome {
            Ok(Ok(tree)) => {
                let snapshot = Arc::new(Snapshot::new(id, tree, self.max_depth));
                if let Err(e) = snapshot.files() {
                    warn!("[{}] {} connected but its tree cannot be flattened: {}", self.owner, credential.title, e);
                }

                let mut store = self.store.write().await;
                let mut snapshots = self.snapshots.write().await;
                store.update_state(id, ConnectionState::Connected)?;
                store.record_success(id)?;
                snapshots.insert(id, snapshot);
                info!("[{}] Connected {}", self.owner, credential.title);
                return Ok(ConnectionState::Connected);
            }
            Ok(Err(e)) => e,
            Err(_) => GatewayError::Timeout,
        };

        let attempts = {
            let mut store = self.store.write().await;
            store.update_state(id, ConnectionState::Failed)?;
            store.record_failure(id)?
        };
        warn!(
            "[{}] Connecting {} failed (attempt {}): {}",
            self.owner, credential.title, attempts, error
        );

        Err(match error {
            GatewayError::Timeout => CatalogError::ConnectionTimeout {
                id,
                timeout_ms: u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
                attempts,
            },
            GatewayError::Auth(reason) => CatalogError::ConnectionAuthFailure { id, reason, attempts },
            GatewayError::Network(reason) => CatalogError::ConnectionNetworkFailure { id, reason, attempts },
        })
    }

    /// Drop the credential's snapshot and mark it Disconnected.
    ///
    /// A Disconnected credential is a no-op; a Connecting one cannot be
    /// disconnected until its fetch settles.
    pub async fn disconnect(&self, id: CredentialId) -> CatalogResult<ConnectionState> {
        let (credential, was_connected) = {
            let mut store = self.store.write().await;
            let from = store.state(id)?;
            if from == ConnectionState::Disconnected {
                return Ok(from);
            }
            store.update_state(id, ConnectionState::Disconnected)?;
            self.snapshots.write().await.remove(&id);
            (GatewayCredential::from(store.get(id)?), from == ConnectionState::Connected)
        };
        info!("[{}] Disconnected {}", self.owner, credential.title);

        if was_connected {
            if let Err(e) = self.gateway.disconnect(&credential).await {
                warn!("[{}] Error disconnecting {}: {}", self.owner, credential.title, e);
            }
        }
        Ok(ConnectionState::Disconnected)
    }

    /// Disconnect every credential, cancelling fetches that are in flight.
    pub async fn disconnect_all(&self) -> DisconnectAllReport {
        let ids = self.store.read().await.ids();
        let mut report = DisconnectAllReport::default();
        for id in ids {
            match self.force_disconnect(id).await {
                Ok(cancelled) => {
                    report.disconnected.push(id);
                    if cancelled {
                        report.cancelled_in_flight.push(id);
                    }
                }
                Err(e) => warn!("[{}] Could not disconnect {}: {}", self.owner, id, e),
            }
        }
        info!(
            "[{}] Disconnected {} sources ({} cancelled in flight)",
            self.owner,
            report.disconnected.len(),
            report.cancelled_in_flight.len()
        );
        report
    }

    /// Disconnect `id` even while it is Connecting: the running fetch is
    /// cancelled and awaited, then the credential is disconnected from Failed.
    /// Returns whether a fetch was cancelled.
    async fn force_disconnect(&self, id: CredentialId) -> CatalogResult<bool> {
        let mut cancelled = false;
        loop {
            match self.disconnect(id).await {
                Err(CatalogError::InvalidTransition {
                    from: ConnectionState::Connecting,
                    ..
                }) => cancelled |= self.cancel_fetch(id).await,
                other => return other.map(|_| cancelled),
            }
        }
    }

    /// Signal the fetch of `id` to stop and wait until it has recorded its outcome.
    async fn cancel_fetch(&self, id: CredentialId) -> bool {
        let flight = self.flights.read().await.get(&id).cloned();
        let Some(flight) = flight else {
            tokio::task::yield_now().await;
            return false;
        };
        debug!("[{}] Cancelling fetch for {}", self.owner, id);
        flight.cancel.notify_one();
        let _settled = flight.done.lock().await;
        true
    }

    /// Connect every registered credential concurrently.
    pub async fn connect_all(&self) -> Vec<(CredentialId, CatalogResult<ConnectionState>)> {
        let ids = self.store.read().await.ids();
        join_all(ids.into_iter().map(|id| async move { (id, self.connect(id).await) })).await
    }

    // ---- snapshots ----

    pub async fn snapshot(&self, id: CredentialId) -> Option<Arc<Snapshot>> {
        self.snapshots.read().await.get(&id).cloned()
    }

    /// Every credential in registration order with its current snapshot.
    pub async fn sources(&self) -> Vec<SourceSnapshot> {
        let store = self.store.read().await;
        let snapshots = self.snapshots.read().await;
        store
            .list()
            .into_iter()
            .map(|credential| SourceSnapshot {
                snapshot: snapshots.get(&credential.id).cloned(),
                credential,
            })
            .collect()
    }
}
