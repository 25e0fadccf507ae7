use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use yuuri_core::Document;

use crate::storage::ChangeEvent;

/// Address of one collection (table) inside a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    pub database: String,
    pub table: String,
}

impl CollectionRef {
    #[must_use]
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Options requested when opening a change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Collapse bursts of changes into the latest value per key.
    pub squash: bool,
    /// Emit the current contents as `Upsert` events before live changes.
    pub include_initial: bool,
    /// Tag every event with its kind (`Upsert` / `Remove`).
    pub tagged_kinds: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            squash: true,
            include_initial: true,
            tagged_kinds: true,
        }
    }
}

/// Live change notifications for one collection.
///
/// Not restartable. The stream ending means the underlying connection closed.
pub type ChangeFeed = BoxStream<'static, ChangeEvent>;

/// Session established by [`StoreClient::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
    pub port: u16,
}

/// Capability interface over the remote document store.
///
/// The wrapper only ever talks to the store through this trait; timeouts and
/// connection pooling are the implementation's business.
/// Implementations: [`MemoryStore`](crate::storage::datastores::MemoryStore) (tests, embedding).
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Open a session with the store.
    async fn connect(&self, host: &str, port: u16) -> anyhow::Result<Connection>;

    /// Open a change subscription on a collection.
    async fn subscribe_changes(
        &self,
        collection: &CollectionRef,
        options: FeedOptions,
    ) -> anyhow::Result<ChangeFeed>;

    /// Point read by primary key. `None` if the document does not exist.
    async fn get(&self, collection: &CollectionRef, key: &str) -> anyhow::Result<Option<Document>>;

    /// Replace (or insert) the whole document stored under `key`.
    ///
    /// Returns the committed value.
    async fn replace(
        &self,
        collection: &CollectionRef,
        key: &str,
        document: &Document,
    ) -> anyhow::Result<Document>;

    /// Names of all databases.
    async fn list_databases(&self) -> anyhow::Result<Vec<String>>;

    /// Create a database. Fails with [`AlreadyExists`](crate::AlreadyExists)
    /// if it exists, unless the store treats that as a no-op.
    async fn create_database(&self, name: &str) -> anyhow::Result<()>;

    /// Names of all tables in `database`.
    async fn list_tables(&self, database: &str) -> anyhow::Result<Vec<String>>;

    /// Create a table in `database`. Same duplicate semantics as
    /// [`create_database`](Self::create_database).
    async fn create_table(&self, name: &str, database: &str) -> anyhow::Result<()>;
}
