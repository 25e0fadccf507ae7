//! Error taxonomy for the synchronized cache wrapper.

use yuuri_core::RecordKind;

/// Errors returned by [`StoreWrapper`](crate::StoreWrapper) operations.
///
/// Store client failures arrive as `anyhow::Error` and are wrapped with the
/// operation that produced them. A missing record is not an error: reads
/// return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connecting to the store failed. Retried by the connection manager;
    /// fatal only for the very first connect.
    #[error("failed to connect to the store at {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: anyhow::Error,
    },

    /// A change subscription could not be opened. Not retried automatically.
    #[error("failed to subscribe to changes on {collection}: {source}")]
    Subscription {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    /// The caller passed unusable arguments.
    #[error("invalid arguments: {0}")]
    Validation(String),

    /// The store is disconnected; the call failed fast instead of waiting.
    #[error("store unavailable, {operation} rejected until the connection is re-established")]
    Unavailable { operation: &'static str },

    /// The store rejected or failed an operation.
    #[error("store operation {operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A normalized document does not deserialize into its typed record.
    #[error("{kind} record {id:?} does not match its typed shape: {source}")]
    Decode {
        kind: RecordKind,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether the error comes from store connectivity (now or at connect time).
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Unavailable { .. })
    }
}

/// Error a [`StoreClient`](crate::StoreClient) returns when asked to create a
/// database or table that already exists.
///
/// The wrapper downcasts creation failures to this type and treats them as
/// the idempotent "already exists" outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{what} {name:?} already exists")]
pub struct AlreadyExists {
    /// `"database"` or `"table"`.
    pub what: &'static str,
    pub name: String,
}
