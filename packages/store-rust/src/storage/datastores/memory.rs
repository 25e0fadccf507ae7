//! In-memory [`StoreClient`] implementation.
//!
//! [`MemoryStore`] behaves like a small document store: databases hold
//! tables, tables hold documents keyed by id, and every mutation is pushed to
//! open change feeds. Connectivity can be cut and restored to exercise the
//! wrapper's degraded mode without a real server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use yuuri_core::Document;

use crate::error::AlreadyExists;
use crate::storage::record::ChangeEvent;
use crate::traits::{ChangeFeed, CollectionRef, Connection, FeedOptions, StoreClient};

type Table = BTreeMap<String, Document>;

/// An open change feed and the collection it watches.
struct Subscriber {
    collection: CollectionRef,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

/// In-memory document store for tests and embedding.
///
/// Every trait method increments a per-operation call counter, readable via
/// [`calls`](Self::calls), so tests can assert which store round-trips
/// actually happened.
pub struct MemoryStore {
    reachable: AtomicBool,
    connected: AtomicBool,
    feeds_supported: AtomicBool,
    failing: AtomicBool,
    strict_create: AtomicBool,
    databases: RwLock<BTreeMap<String, BTreeMap<String, Table>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    last_feed_options: Mutex<Option<FeedOptions>>,
    calls: DashMap<&'static str, u64>,
}

impl MemoryStore {
    /// Creates an empty, reachable store with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            feeds_supported: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            strict_create: AtomicBool::new(false),
            databases: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
            last_feed_options: Mutex::new(None),
            calls: DashMap::new(),
        }
    }

    /// Creates a store that already contains `database` with the given tables.
    #[must_use]
    pub fn with_layout(database: &str, tables: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut databases = store.databases.write();
            let db = databases.entry(database.to_string()).or_default();
            for table in tables {
                db.entry((*table).to_string()).or_default();
            }
        }
        store
    }

    // --- Simulation hooks ---

    /// Closes the session: every open change feed ends and further calls fail
    /// until the next successful `connect`.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the senders ends the feeds.
        self.subscribers.lock().clear();
    }

    /// Whether `connect` succeeds.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Whether `subscribe_changes` is supported.
    pub fn set_feeds_supported(&self, supported: bool) {
        self.feeds_supported.store(supported, Ordering::SeqCst);
    }

    /// When set, every data and admin call fails while the session stays open.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// When set, creating an existing database or table fails with
    /// [`AlreadyExists`] instead of being a no-op.
    pub fn set_strict_create(&self, strict: bool) {
        self.strict_create.store(strict, Ordering::SeqCst);
    }

    /// Writes a document as another client would, notifying open feeds.
    ///
    /// The key is the document's string `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no string `id` or the table does
    /// not exist.
    pub fn put_external(
        &self,
        collection: &CollectionRef,
        document: Document,
    ) -> anyhow::Result<()> {
        let key = document
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow!("document has no string id"))?
            .to_string();
        self.with_table(collection, |table| table.insert(key.clone(), document.clone()))?;
        self.broadcast(collection, &ChangeEvent::upsert(&collection.table, key, document));
        Ok(())
    }

    /// Deletes a document as another client would, notifying open feeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn remove_external(&self, collection: &CollectionRef, key: &str) -> anyhow::Result<()> {
        let removed = self.with_table(collection, |table| table.remove(key))?;
        if removed.is_some() {
            self.broadcast(collection, &ChangeEvent::remove(&collection.table, key));
        }
        Ok(())
    }

    // --- Inspection ---

    /// Number of times the named trait method was called (e.g. `"get"`).
    #[must_use]
    pub fn calls(&self, operation: &str) -> u64 {
        self.calls.get(operation).map_or(0, |count| *count)
    }

    /// Reads a stored document directly, bypassing the session.
    #[must_use]
    pub fn document(&self, collection: &CollectionRef, key: &str) -> Option<Document> {
        self.databases
            .read()
            .get(&collection.database)
            .and_then(|db| db.get(&collection.table))
            .and_then(|table| table.get(key).cloned())
    }

    /// Number of change feeds whose consumer is still listening.
    #[must_use]
    pub fn open_feeds(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| !sub.tx.is_closed());
        subscribers.len()
    }

    /// Options passed to the most recent `subscribe_changes` call.
    #[must_use]
    pub fn last_feed_options(&self) -> Option<FeedOptions> {
        *self.last_feed_options.lock()
    }

    // --- Internals ---

    fn record_call(&self, operation: &'static str) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    /// Counts the call and rejects it if there is no usable session.
    fn begin(&self, operation: &'static str) -> anyhow::Result<()> {
        self.record_call(operation);
        if !self.connected.load(Ordering::SeqCst) {
            bail!("{operation}: no open connection to the store");
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("{operation}: store reported an internal error");
        }
        Ok(())
    }

    fn with_table<R>(
        &self,
        collection: &CollectionRef,
        f: impl FnOnce(&mut Table) -> R,
    ) -> anyhow::Result<R> {
        let mut databases = self.databases.write();
        let table = databases
            .get_mut(&collection.database)
            .and_then(|db| db.get_mut(&collection.table))
            .ok_or_else(|| anyhow!("table {collection} does not exist"))?;
        Ok(f(table))
    }

    fn broadcast(&self, collection: &CollectionRef, event: &ChangeEvent) {
        self.subscribers.lock().retain(|sub| {
            if sub.collection != *collection {
                return true;
            }
            sub.tx.send(event.clone()).is_ok()
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn connect(&self, host: &str, port: u16) -> anyhow::Result<Connection> {
        self.record_call("connect");
        if !self.reachable.load(Ordering::SeqCst) {
            bail!("connection refused by {host}:{port}");
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(Connection {
            host: host.to_string(),
            port,
        })
    }

    async fn subscribe_changes(
        &self,
        collection: &CollectionRef,
        options: FeedOptions,
    ) -> anyhow::Result<ChangeFeed> {
        self.begin("subscribe_changes")?;
        if !self.feeds_supported.load(Ordering::SeqCst) {
            bail!("change feeds are not supported by this store");
        }
        *self.last_feed_options.lock() = Some(options);

        let (tx, rx) = mpsc::unbounded_channel();

        // Register under the subscriber lock so no write slips between the
        // snapshot and the registration.
        let mut subscribers = self.subscribers.lock();
        {
            let databases = self.databases.read();
            let table = databases
                .get(&collection.database)
                .and_then(|db| db.get(&collection.table))
                .ok_or_else(|| anyhow!("table {collection} does not exist"))?;
            if options.include_initial {
                for (key, doc) in table {
                    // The receiver is alive: it is still in scope here.
                    let _ = tx.send(ChangeEvent::upsert(&collection.table, key, doc.clone()));
                }
            }
        }
        subscribers.push(Subscriber {
            collection: collection.clone(),
            tx,
        });
        drop(subscribers);

        let feed = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(Box::pin(feed))
    }

    async fn get(&self, collection: &CollectionRef, key: &str) -> anyhow::Result<Option<Document>> {
        self.begin("get")?;
        self.with_table(collection, |table| table.get(key).cloned())
    }

    async fn replace(
        &self,
        collection: &CollectionRef,
        key: &str,
        document: &Document,
    ) -> anyhow::Result<Document> {
        self.begin("replace")?;
        self.with_table(collection, |table| {
            table.insert(key.to_string(), document.clone());
        })?;
        self.broadcast(
            collection,
            &ChangeEvent::upsert(&collection.table, key, document.clone()),
        );
        Ok(document.clone())
    }

    async fn list_databases(&self) -> anyhow::Result<Vec<String>> {
        self.begin("list_databases")?;
        Ok(self.databases.read().keys().cloned().collect())
    }

    async fn create_database(&self, name: &str) -> anyhow::Result<()> {
        self.begin("create_database")?;
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            if self.strict_create.load(Ordering::SeqCst) {
                return Err(AlreadyExists {
                    what: "database",
                    name: name.to_string(),
                }
                .into());
            }
            return Ok(());
        }
        databases.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn list_tables(&self, database: &str) -> anyhow::Result<Vec<String>> {
        self.begin("list_tables")?;
        let databases = self.databases.read();
        let db = databases
            .get(database)
            .ok_or_else(|| anyhow!("database {database:?} does not exist"))?;
        Ok(db.keys().cloned().collect())
    }

    async fn create_table(&self, name: &str, database: &str) -> anyhow::Result<()> {
        self.begin("create_table")?;
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(database)
            .ok_or_else(|| anyhow!("database {database:?} does not exist"))?;
        if db.contains_key(name) {
            if self.strict_create.load(Ordering::SeqCst) {
                return Err(AlreadyExists {
                    what: "table",
                    name: name.to_string(),
                }
                .into());
            }
            return Ok(());
        }
        db.insert(name.to_string(), Table::new());
        Ok(())
    }
}
