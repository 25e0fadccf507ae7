//! Yuuri Store: change-feed synchronized cache over the `guilds` and `users`
//! collections, with fail-fast degraded mode and fixed-interval reconnection.

pub mod config;
pub mod error;
pub mod storage;
pub mod sync;
pub mod telemetry;
pub mod traits;
pub mod wrapper;

pub use config::{StoreArgs, StoreConfig};
pub use error::{AlreadyExists, StoreError};
pub use storage::{
    AvailabilityObserver, ChangeEvent, ChangeKind, CompositeAvailabilityObserver, EntryCache,
    ErrorSink, FeatureGate, HashMapCache, MemoryStore, TracingErrorSink, STORE_UNAVAILABLE_REASON,
};
pub use sync::{ConnectionState, SyncState};
pub use telemetry::{init_tracing, TracingFormat};
pub use traits::{ChangeFeed, CollectionRef, Connection, FeedOptions, StoreClient};
pub use wrapper::{StoreWrapper, StoreWrapperBuilder};
