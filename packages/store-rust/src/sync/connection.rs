//! Connection manager: connectivity state machine and reconnection loop.
//!
//! State machine: Disconnected -> Connected -> Disconnected -> Connecting -> Connected
//!
//! The manager owns the change consumer tasks of the current subscription
//! generation (epoch). A supervisor task waits for feed-closure reports; a
//! report from the current epoch means the store connection is gone, which
//! starts the fixed-interval retry loop. Reports from older epochs are stale
//! and ignored, so both feeds closing together triggers a single recovery.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use yuuri_core::RecordKind;

use super::feed::{spawn_consumer, FeedClosed};
use super::state::SyncState;
use crate::error::StoreError;
use crate::traits::Connection;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Store connectivity as seen by the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable session; store-dependent calls fail fast.
    Disconnected,
    /// A reconnection attempt is in progress.
    Connecting,
    /// Session open and change feeds running.
    Connected,
}

// ---------------------------------------------------------------------------
// RetryGuard
// ---------------------------------------------------------------------------

/// RAII guard marking the retry loop as running.
///
/// Acquisition fails while another loop holds the flag. The flag is cleared
/// on drop, including when the loop's task is aborted.
#[derive(Debug)]
struct RetryGuard {
    flag: Arc<AtomicBool>,
}

impl RetryGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for RetryGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Tracks store connectivity and restores it after a loss.
pub struct ConnectionManager {
    state: Arc<SyncState>,
    epoch: AtomicU64,
    feeds: Mutex<Vec<JoinHandle<()>>>,
    closed_tx: mpsc::UnboundedSender<FeedClosed>,
    closed_rx: Mutex<Option<mpsc::UnboundedReceiver<FeedClosed>>>,
    retrying: Arc<AtomicBool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(state: Arc<SyncState>) -> Self {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        Self {
            state,
            epoch: AtomicU64::new(0),
            feeds: Mutex::new(Vec::new()),
            closed_tx,
            closed_rx: Mutex::new(Some(closed_rx)),
            retrying: Arc::new(AtomicBool::new(false)),
            supervisor: Mutex::new(None),
        }
    }

    /// Opens a session with the store at `host:port`.
    ///
    /// The endpoint is remembered for reconnection. On success the state
    /// becomes `Connected` and availability observers are told `true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the store cannot be reached; the
    /// state stays `Disconnected`.
    pub async fn connect(&self, host: &str, port: u16) -> Result<Connection, StoreError> {
        self.state.set_endpoint(host, port);
        self.state.transition(ConnectionState::Connecting);
        match self.state.client.connect(host, port).await {
            Ok(connection) => {
                self.state.transition(ConnectionState::Connected);
                info!(host, port, "connection to the store established");
                Ok(connection)
            }
            Err(source) => {
                self.state.transition(ConnectionState::Disconnected);
                Err(StoreError::Connection {
                    host: host.to_string(),
                    port,
                    source,
                })
            }
        }
    }

    /// Opens a fresh change subscription for every collection under a new
    /// epoch, replacing (and aborting) the previous generation's consumers.
    ///
    /// Guilds are subscribed before users. If a subscription fails, consumers
    /// that were already started keep running.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscription`] for the first refused subscription.
    pub async fn subscribe_all(&self) -> Result<(), StoreError> {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let mut handles = Vec::with_capacity(RecordKind::ALL.len());
        let mut outcome = Ok(());
        for kind in RecordKind::ALL {
            match spawn_consumer(&self.state, kind, epoch, self.closed_tx.clone()).await {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        let previous = std::mem::replace(&mut *self.feeds.lock(), handles);
        for handle in previous {
            handle.abort();
        }
        debug!(epoch, "change subscriptions replaced");
        outcome
    }

    /// Starts the supervisor that reacts to closed feeds.
    ///
    /// Returns `false` if the supervisor was already started.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(mut closed_rx) = self.closed_rx.lock().take() else {
            return false;
        };
        let weak = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(closed) = closed_rx.recv().await {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                if closed.epoch != manager.epoch() {
                    debug!(
                        epoch = closed.epoch,
                        kind = %closed.kind,
                        "ignoring closure of a superseded change feed"
                    );
                    continue;
                }
                drop(manager);
                Self::recover(&weak).await;
            }
        });

        *self.supervisor.lock() = Some(handle);
        true
    }

    /// Current subscription generation.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Whether the retry loop is currently running.
    #[must_use]
    pub fn is_retrying(&self) -> bool {
        self.retrying.load(Ordering::Acquire)
    }

    /// Enters degraded mode and retries until the store is back.
    ///
    /// Holds only a weak reference between attempts so dropping the wrapper
    /// ends the loop.
    async fn recover(weak: &Weak<Self>) {
        let Some(manager) = weak.upgrade() else {
            return;
        };
        let Some(_guard) = RetryGuard::acquire(&manager.retrying) else {
            debug!("retry loop already running");
            return;
        };

        let interval = manager.state.config.retry_interval;
        manager.state.transition(ConnectionState::Disconnected);
        warn!(
            retry_in = ?interval,
            "connection to the store closed, store-dependent operations are unavailable"
        );
        drop(manager);

        let mut attempt: u64 = 0;
        loop {
            tokio::time::sleep(interval).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };
            attempt += 1;

            manager.state.transition(ConnectionState::Connecting);
            match manager.reconnect_once().await {
                Ok(()) => {
                    manager.state.transition(ConnectionState::Connected);
                    let (host, port) = manager.state.endpoint();
                    info!(%host, port, attempt, "connection to the store re-established");
                    return;
                }
                Err(err) => {
                    manager.state.transition(ConnectionState::Disconnected);
                    warn!(
                        attempt,
                        retry_in = ?interval,
                        error = %err,
                        "reconnection attempt failed"
                    );
                }
            }
        }
    }

    async fn reconnect_once(&self) -> Result<(), StoreError> {
        let (host, port) = self.state.endpoint();
        self.state
            .client
            .connect(&host, port)
            .await
            .map_err(|source| StoreError::Connection {
                host: host.clone(),
                port,
                source,
            })?;
        // Removals missed while disconnected are never replayed; the new
        // feeds' initial snapshots rebuild both caches from scratch.
        for kind in RecordKind::ALL {
            self.state.cache(kind).clear();
        }
        self.subscribe_all().await
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.get_mut().take() {
            handle.abort();
        }
        for handle in self.feeds.get_mut().drain(..) {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
