//! Shared state of one wrapper instance.
//!
//! [`SyncState`] is owned through an `Arc` by the facade, the connection
//! manager and every change consumer task. It holds the store client, both
//! entry caches, the connection state and the outbound notification seams.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tokio::sync::watch;
use yuuri_core::RecordKind;

use super::connection::ConnectionState;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::storage::{AvailabilityObserver, CompositeAvailabilityObserver, EntryCache, ErrorSink};
use crate::traits::StoreClient;

/// State shared between the facade and its background tasks.
pub struct SyncState {
    pub(crate) client: Arc<dyn StoreClient>,
    pub(crate) config: StoreConfig,
    endpoint: RwLock<(String, u16)>,
    guilds: Arc<dyn EntryCache>,
    users: Arc<dyn EntryCache>,
    state: ArcSwap<ConnectionState>,
    availability: watch::Sender<bool>,
    observers: CompositeAvailabilityObserver,
    errors: Arc<dyn ErrorSink>,
}

impl SyncState {
    /// Creates the state in `Disconnected`, targeting the configured endpoint.
    #[must_use]
    pub fn new(
        client: Arc<dyn StoreClient>,
        config: StoreConfig,
        guilds: Arc<dyn EntryCache>,
        users: Arc<dyn EntryCache>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        let (availability, _rx) = watch::channel(false);
        let endpoint = (config.host.clone(), config.port);
        Self {
            client,
            config,
            endpoint: RwLock::new(endpoint),
            guilds,
            users,
            state: ArcSwap::from_pointee(ConnectionState::Disconnected),
            availability,
            observers: CompositeAvailabilityObserver::default(),
            errors,
        }
    }

    /// Entry cache mirroring the collection of `kind`.
    #[must_use]
    pub fn cache(&self, kind: RecordKind) -> &Arc<dyn EntryCache> {
        match kind {
            RecordKind::Guild => &self.guilds,
            RecordKind::User => &self.users,
        }
    }

    /// Host and port used by the last `connect` (and by reconnection).
    #[must_use]
    pub fn endpoint(&self) -> (String, u16) {
        self.endpoint.read().clone()
    }

    pub(crate) fn set_endpoint(&self, host: &str, port: u16) {
        *self.endpoint.write() = (host.to_string(), port);
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        **self.state.load()
    }

    /// Whether store-dependent operations may run.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Receiver tracking availability; `true` while connected.
    #[must_use]
    pub fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.availability.subscribe()
    }

    pub fn register_observer(&self, observer: Arc<dyn AvailabilityObserver>) {
        self.observers.add(observer);
    }

    /// Moves to `next`, notifying observers when availability flips.
    pub(crate) fn transition(&self, next: ConnectionState) {
        let previous = *self.state.swap(Arc::new(next));
        let was_available = previous == ConnectionState::Connected;
        let available = next == ConnectionState::Connected;
        if was_available != available {
            self.availability.send_replace(available);
            self.observers.on_availability_change(available);
        }
    }

    /// Forwards an error event to the sink.
    pub(crate) fn report(&self, error: &StoreError, context: Option<&str>) {
        self.errors.on_error(error, context);
    }
}
