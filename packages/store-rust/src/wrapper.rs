//! Facade over the store: cache-first reads, write-through updates and
//! idempotent layout administration.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};
use yuuri_core::{Document, Record, RecordKind, SchemaRegistry, Upgrade, ID_FIELD};

use crate::config::StoreConfig;
use crate::error::{AlreadyExists, StoreError};
use crate::storage::{
    AvailabilityObserver, EntryCache, ErrorSink, HashMapCache, TracingErrorSink,
};
use crate::sync::{ConnectionManager, ConnectionState, SyncState};
use crate::traits::{Connection, StoreClient};

/// Builder for [`StoreWrapper`].
pub struct StoreWrapperBuilder {
    client: Arc<dyn StoreClient>,
    config: StoreConfig,
    schema: SchemaRegistry,
    upgrader: Option<Arc<dyn Upgrade>>,
    errors: Arc<dyn ErrorSink>,
    observers: Vec<Arc<dyn AvailabilityObserver>>,
}

impl StoreWrapperBuilder {
    /// Replaces the canonical schema used for normalization.
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaRegistry) -> Self {
        self.schema = schema;
        self
    }

    /// Replaces schema normalization with a custom upgrade strategy.
    #[must_use]
    pub fn with_upgrader(mut self, upgrader: impl Upgrade + 'static) -> Self {
        self.upgrader = Some(Arc::new(upgrader));
        self
    }

    /// Routes error events to `sink` instead of the tracing log.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = sink;
        self
    }

    /// Registers an availability observer before the first connect.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AvailabilityObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn build(self) -> StoreWrapper {
        let state = Arc::new(SyncState::new(
            self.client,
            self.config,
            Arc::new(HashMapCache::new()),
            Arc::new(HashMapCache::new()),
            self.errors,
        ));
        for observer in self.observers {
            state.register_observer(observer);
        }
        let upgrader = match self.upgrader {
            Some(upgrader) => upgrader,
            None => Arc::new(self.schema),
        };
        StoreWrapper {
            manager: Arc::new(ConnectionManager::new(Arc::clone(&state))),
            state,
            upgrader,
        }
    }
}

/// Synchronized cache wrapper around a document store.
///
/// Reads are served from an in-memory mirror of the `guilds` and `users`
/// collections kept current by change feeds, and fall through to the store
/// on a miss. Every document handed out is upgraded to the canonical shape.
/// While the store is unreachable, cached reads keep working and every
/// operation needing a store round-trip fails fast with
/// [`StoreError::Unavailable`].
///
/// Dropping the wrapper stops its background tasks.
pub struct StoreWrapper {
    state: Arc<SyncState>,
    manager: Arc<ConnectionManager>,
    upgrader: Arc<dyn Upgrade>,
}

impl StoreWrapper {
    /// Creates a wrapper with the default schema and error sink.
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>, config: StoreConfig) -> Self {
        Self::builder(client, config).build()
    }

    #[must_use]
    pub fn builder(client: Arc<dyn StoreClient>, config: StoreConfig) -> StoreWrapperBuilder {
        StoreWrapperBuilder {
            client,
            config,
            schema: SchemaRegistry::default(),
            upgrader: None,
            errors: Arc::new(TracingErrorSink),
            observers: Vec::new(),
        }
    }

    // --- Lifecycle ---

    /// Connects to the configured host and port.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the store cannot be reached.
    pub async fn connect(&self) -> Result<Connection, StoreError> {
        let (host, port) = (self.state.config.host.clone(), self.state.config.port);
        self.connect_to(&host, port).await
    }

    /// Connects to an explicit endpoint, which is also used for reconnection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the store cannot be reached.
    pub async fn connect_to(&self, host: &str, port: u16) -> Result<Connection, StoreError> {
        self.manager.connect(host, port).await
    }

    /// Opens the change feeds for both collections and starts connection
    /// supervision. Call after a successful [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscription`] if a feed cannot be opened. Feeds
    /// opened before the failure keep running and fetch-through reads still
    /// work, but lost connections are not recovered.
    pub async fn init(&self) -> Result<(), StoreError> {
        if let Err(err) = self.manager.subscribe_all().await {
            self.state.report(&err, Some("init"));
            return Err(err);
        }
        self.manager.start();
        info!(database = %self.state.config.database, "change feeds running");
        Ok(())
    }

    // --- Reads ---

    /// Returns the normalized document of `kind` with key `id`.
    ///
    /// A cached document is returned without a store call. On a miss the
    /// store is read directly; the result is not cached (the change feed
    /// delivers every document the store holds).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on a miss while disconnected, or
    /// [`StoreError::Operation`] if the store read fails.
    pub async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Document>, StoreError> {
        if let Some(cached) = self.state.cache(kind).get(id) {
            return Ok(Some(self.upgrader.upgrade(kind, cached)));
        }
        self.require_available("get")?;

        debug!(%kind, id, "cache miss, reading from the store");
        let collection = self.state.config.collection(kind);
        match self.state.client.get(&collection, id).await {
            Ok(found) => Ok(found.map(|stored| self.upgrader.upgrade(kind, stored))),
            Err(source) => Err(self.fail(
                StoreError::Operation {
                    operation: "get",
                    source,
                },
                &format!("get {kind} {id}"),
            )),
        }
    }

    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub async fn get_guild(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.get(RecordKind::Guild, id).await
    }

    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub async fn get_user(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.get(RecordKind::User, id).await
    }

    /// Reads a record and decodes it into its typed form.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`StoreError::Decode`] if the normalized
    /// document does not fit `R` (only possible with a custom schema or
    /// upgrader).
    pub async fn get_record<R: Record>(&self, id: &str) -> Result<Option<R>, StoreError> {
        let Some(document) = self.get(R::KIND, id).await? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(document))
            .map(Some)
            .map_err(|source| StoreError::Decode {
                kind: R::KIND,
                id: id.to_string(),
                source,
            })
    }

    // --- Writes ---

    /// Replaces the whole stored document keyed by `data.id` and mirrors the
    /// written value into the cache. Returns the written document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if `data` is empty or lacks a
    /// non-empty string `id`, [`StoreError::Unavailable`] while disconnected,
    /// or [`StoreError::Operation`] if the store rejects the write.
    pub async fn set(&self, data: Document, kind: RecordKind) -> Result<Document, StoreError> {
        let id = validate_document(&data)?.to_string();
        self.require_available("set")?;

        let collection = self.state.config.collection(kind);
        if let Err(source) = self.state.client.replace(&collection, &id, &data).await {
            return Err(self.fail(
                StoreError::Operation {
                    operation: "set",
                    source,
                },
                &format!("set {kind} {id}"),
            ));
        }
        self.state.cache(kind).set(&id, data.clone());
        Ok(data)
    }

    /// [`set`](Self::set) with the kind given by name (`"guild"` or `"user"`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an unknown kind, otherwise as
    /// [`set`](Self::set).
    pub async fn set_by_name(&self, data: Document, kind: &str) -> Result<Document, StoreError> {
        let kind =
            RecordKind::from_str(kind).map_err(|err| StoreError::Validation(err.to_string()))?;
        self.set(data, kind).await
    }

    /// Writes a typed record.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set); a record that does not serialize to an object
    /// is a [`StoreError::Validation`].
    pub async fn set_record<R: Record>(&self, record: &R) -> Result<Document, StoreError> {
        let value = serde_json::to_value(record)
            .map_err(|err| StoreError::Validation(format!("record does not serialize: {err}")))?;
        let Value::Object(document) = value else {
            return Err(StoreError::Validation(
                "record does not serialize to an object".to_string(),
            ));
        };
        self.set(document, R::KIND).await
    }

    // --- Administration ---

    /// Creates database `name` unless it already exists.
    ///
    /// Returns `true` if it was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty name,
    /// [`StoreError::Unavailable`] while disconnected, or
    /// [`StoreError::Operation`] if listing or creation fails.
    pub async fn create_database(&self, name: &str) -> Result<bool, StoreError> {
        require_name("database", name)?;
        self.require_available("create_database")?;
        let context = format!("create database {name}");

        let existing = self.state.client.list_databases().await.map_err(|source| {
            self.fail(
                StoreError::Operation {
                    operation: "list_databases",
                    source,
                },
                &context,
            )
        })?;
        if existing.iter().any(|db| db == name) {
            return Ok(false);
        }

        match self.state.client.create_database(name).await {
            Ok(()) => {
                info!(database = name, "database created");
                Ok(true)
            }
            Err(source) if source.downcast_ref::<AlreadyExists>().is_some() => Ok(false),
            Err(source) => Err(self.fail(
                StoreError::Operation {
                    operation: "create_database",
                    source,
                },
                &context,
            )),
        }
    }

    /// Creates table `name` in `database` unless it already exists.
    ///
    /// Returns `true` if it was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty name,
    /// [`StoreError::Unavailable`] while disconnected, or
    /// [`StoreError::Operation`] if listing or creation fails.
    pub async fn create_table(&self, name: &str, database: &str) -> Result<bool, StoreError> {
        require_name("table", name)?;
        require_name("database", database)?;
        self.require_available("create_table")?;
        let context = format!("create table {database}.{name}");

        let existing = self.state.client.list_tables(database).await.map_err(|source| {
            self.fail(
                StoreError::Operation {
                    operation: "list_tables",
                    source,
                },
                &context,
            )
        })?;
        if existing.iter().any(|table| table == name) {
            return Ok(false);
        }

        match self.state.client.create_table(name, database).await {
            Ok(()) => {
                info!(database, table = name, "table created");
                Ok(true)
            }
            Err(source) if source.downcast_ref::<AlreadyExists>().is_some() => Ok(false),
            Err(source) => Err(self.fail(
                StoreError::Operation {
                    operation: "create_table",
                    source,
                },
                &context,
            )),
        }
    }

    /// Creates the configured database and both tables if missing.
    ///
    /// # Errors
    ///
    /// As [`create_database`](Self::create_database) and
    /// [`create_table`](Self::create_table).
    pub async fn ensure_layout(&self) -> Result<(), StoreError> {
        let config = &self.state.config;
        self.create_database(&config.database).await?;
        self.create_table(&config.guild_table, &config.database).await?;
        self.create_table(&config.user_table, &config.database).await?;
        Ok(())
    }

    // --- Introspection ---

    /// Whether store-dependent operations can currently run.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.is_available()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state()
    }

    /// Receiver tracking availability, for tasks that prefer awaiting
    /// changes over implementing [`AvailabilityObserver`].
    #[must_use]
    pub fn availability(&self) -> watch::Receiver<bool> {
        self.state.subscribe_availability()
    }

    pub fn register_observer(&self, observer: Arc<dyn AvailabilityObserver>) {
        self.state.register_observer(observer);
    }

    /// Raw (not normalized) cache of `kind`.
    #[must_use]
    pub fn cache(&self, kind: RecordKind) -> &Arc<dyn EntryCache> {
        self.state.cache(kind)
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.state.config
    }

    fn require_available(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.state.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable { operation })
        }
    }

    /// Reports a store failure to the error sink and hands it back.
    fn fail(&self, error: StoreError, context: &str) -> StoreError {
        self.state.report(&error, Some(context));
        error
    }
}

fn validate_document(data: &Document) -> Result<&str, StoreError> {
    if data.is_empty() {
        return Err(StoreError::Validation("document is empty".to_string()));
    }
    match data.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(Value::String(_)) => Err(StoreError::Validation("document id is empty".to_string())),
        Some(_) => Err(StoreError::Validation("document id must be a string".to_string())),
        None => Err(StoreError::Validation("document has no id".to_string())),
    }
}

fn require_name(what: &str, name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::Validation(format!("{what} name is empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;
    use yuuri_core::{GuildRecord, UpgradeFn, UserRecord};

    use super::*;
    use crate::storage::MemoryStore;
    use crate::traits::CollectionRef;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ErrorSink for RecordingSink {
        fn on_error(&self, error: &StoreError, context: Option<&str>) {
            self.events
                .lock()
                .push((error.to_string(), context.map(str::to_string)));
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn guilds() -> CollectionRef {
        CollectionRef::new("data", "guilds")
    }

    fn builder(store: &Arc<MemoryStore>) -> StoreWrapperBuilder {
        StoreWrapper::builder(
            Arc::clone(store) as Arc<dyn StoreClient>,
            StoreConfig::default(),
        )
    }

    async fn connected(store: &Arc<MemoryStore>) -> StoreWrapper {
        let wrapper = builder(store).build();
        wrapper.connect().await.unwrap();
        wrapper
    }

    fn layout_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_layout("data", &["guilds", "users"]))
    }

    #[tokio::test]
    async fn miss_reads_through_and_normalizes() {
        let store = layout_store();
        let wrapper = connected(&store).await;
        store
            .put_external(&guilds(), doc(json!({"id": "1", "legacy": true})))
            .unwrap();

        let found = wrapper.get_guild("1").await.unwrap().unwrap();
        assert_eq!(found, doc(json!({"id": "1", "prefix": ""})));
        assert_eq!(store.calls("get"), 1);
        // Fetch-through does not populate the cache.
        assert!(!wrapper.cache(RecordKind::Guild).has("1"));
    }

    #[tokio::test]
    async fn absent_record_is_none() {
        let store = layout_store();
        let wrapper = connected(&store).await;
        assert_eq!(wrapper.get_user("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_hit_skips_the_store_and_normalizes() {
        let store = layout_store();
        let wrapper = connected(&store).await;
        wrapper
            .cache(RecordKind::User)
            .set("7", doc(json!({"id": "7", "old": 1})));

        let found = wrapper.get_user("7").await.unwrap().unwrap();
        assert_eq!(found, doc(json!({"id": "7", "blacklisted": false})));
        assert_eq!(store.calls("get"), 0);
    }

    #[tokio::test]
    async fn set_writes_through_and_caches_the_written_value() {
        let store = layout_store();
        let wrapper = connected(&store).await;

        let written = wrapper
            .set(doc(json!({"id": "42", "prefix": ">"})), RecordKind::Guild)
            .await
            .unwrap();

        assert_eq!(written, doc(json!({"id": "42", "prefix": ">"})));
        assert_eq!(store.document(&guilds(), "42"), Some(written.clone()));
        assert_eq!(wrapper.cache(RecordKind::Guild).get("42"), Some(written));
        assert_eq!(wrapper.get_guild("42").await.unwrap().unwrap()["prefix"], ">");
        assert_eq!(store.calls("get"), 0);
    }

    #[tokio::test]
    async fn set_rejects_invalid_documents() {
        let store = layout_store();
        let wrapper = connected(&store).await;

        for bad in [json!({}), json!({"prefix": "!"}), json!({"id": ""}), json!({"id": 5})] {
            let err = wrapper.set(doc(bad), RecordKind::Guild).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{err}");
        }
        assert_eq!(store.calls("replace"), 0);
    }

    #[tokio::test]
    async fn set_by_name_rejects_unknown_kinds() {
        let store = layout_store();
        let wrapper = connected(&store).await;

        let err = wrapper
            .set_by_name(doc(json!({"id": "1"})), "channel")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        wrapper
            .set_by_name(doc(json!({"id": "1", "blacklisted": true})), "user")
            .await
            .unwrap();
        assert!(wrapper.cache(RecordKind::User).has("1"));
    }

    #[tokio::test]
    async fn typed_records_round_trip_through_the_wrapper() {
        let store = layout_store();
        let wrapper = connected(&store).await;

        let mut guild = GuildRecord::new("5");
        guild.prefix = "?".to_string();
        wrapper.set_record(&guild).await.unwrap();
        assert_eq!(wrapper.get_record::<GuildRecord>("5").await.unwrap(), Some(guild));

        assert_eq!(wrapper.get_record::<UserRecord>("5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn undecodable_record_is_a_decode_error() {
        let store = layout_store();
        let wrapper = builder(&store)
            .with_schema(SchemaRegistry::default().with_field(
                RecordKind::Guild,
                "prefix",
                json!(3),
            ))
            .build();
        wrapper.connect().await.unwrap();
        store.put_external(&guilds(), doc(json!({"id": "1"}))).unwrap();

        let err = wrapper.get_record::<GuildRecord>("1").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { kind: RecordKind::Guild, .. }));
    }

    #[tokio::test]
    async fn custom_upgrader_replaces_normalization() {
        let store = layout_store();
        let wrapper = builder(&store)
            .with_upgrader(UpgradeFn(|_kind: RecordKind, mut stored: Document| {
                stored.insert("upgraded".to_string(), json!(true));
                stored
            }))
            .build();
        wrapper.connect().await.unwrap();
        store
            .put_external(&guilds(), doc(json!({"id": "1", "legacy": 1})))
            .unwrap();

        let found = wrapper.get_guild("1").await.unwrap().unwrap();
        assert_eq!(found, doc(json!({"id": "1", "legacy": 1, "upgraded": true})));
    }

    #[tokio::test]
    async fn create_database_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let wrapper = connected(&store).await;

        assert!(wrapper.create_database("data").await.unwrap());
        assert!(!wrapper.create_database("data").await.unwrap());
        assert_eq!(store.calls("create_database"), 1);
        assert_eq!(store.calls("list_databases"), 2);
    }

    /// Store racing another writer: listings lag behind creations made by
    /// another process, and `replace` answers with a document that differs
    /// from the one written.
    struct RacingStore(MemoryStore);

    #[async_trait::async_trait]
    impl StoreClient for RacingStore {
        async fn connect(&self, host: &str, port: u16) -> anyhow::Result<Connection> {
            self.0.connect(host, port).await
        }
        async fn subscribe_changes(
            &self,
            collection: &CollectionRef,
            options: crate::traits::FeedOptions,
        ) -> anyhow::Result<crate::traits::ChangeFeed> {
            self.0.subscribe_changes(collection, options).await
        }
        async fn get(
            &self,
            collection: &CollectionRef,
            key: &str,
        ) -> anyhow::Result<Option<Document>> {
            self.0.get(collection, key).await
        }
        async fn replace(
            &self,
            collection: &CollectionRef,
            key: &str,
            document: &Document,
        ) -> anyhow::Result<Document> {
            let mut committed = self.0.replace(collection, key, document).await?;
            committed.insert("prefix".to_string(), json!("from another writer"));
            Ok(committed)
        }
        async fn list_databases(&self) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn create_database(&self, name: &str) -> anyhow::Result<()> {
            self.0.create_database(name).await
        }
        async fn list_tables(&self, _database: &str) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn create_table(&self, name: &str, database: &str) -> anyhow::Result<()> {
            self.0.create_table(name, database).await
        }
    }

    #[tokio::test]
    async fn concurrent_creation_counts_as_existing() {
        let (racing, wrapper) = racing_wrapper(MemoryStore::with_layout("data", &["guilds"])).await;
        let store = &racing.0;
        store.set_strict_create(true);

        assert!(!wrapper.create_database("data").await.unwrap());
        assert!(!wrapper.create_table("guilds", "data").await.unwrap());
        assert!(wrapper.create_table("users", "data").await.unwrap());
        assert_eq!(store.calls("create_table"), 2);
    }

    async fn racing_wrapper(store: MemoryStore) -> (Arc<RacingStore>, StoreWrapper) {
        let racing = Arc::new(RacingStore(store));
        let wrapper = StoreWrapper::new(
            Arc::clone(&racing) as Arc<dyn StoreClient>,
            StoreConfig::default(),
        );
        wrapper.connect().await.unwrap();
        (racing, wrapper)
    }

    #[tokio::test]
    async fn set_caches_and_returns_the_value_it_wrote() {
        let (_racing, wrapper) =
            racing_wrapper(MemoryStore::with_layout("data", &["guilds", "users"])).await;
        let written = doc(json!({"id": "42", "prefix": ">"}));

        let returned = wrapper.set(written.clone(), RecordKind::Guild).await.unwrap();

        assert_eq!(returned, written);
        assert_eq!(wrapper.cache(RecordKind::Guild).get("42"), Some(written));
    }

    #[tokio::test]
    async fn ensure_layout_creates_database_and_tables() {
        let store = Arc::new(MemoryStore::new());
        let wrapper = connected(&store).await;

        wrapper.ensure_layout().await.unwrap();
        assert_eq!(store.list_databases().await.unwrap(), vec!["data"]);
        assert_eq!(store.list_tables("data").await.unwrap(), vec!["guilds", "users"]);

        wrapper.ensure_layout().await.unwrap();
        assert_eq!(store.calls("create_table"), 2);
    }

    #[tokio::test]
    async fn empty_names_are_rejected() {
        let store = layout_store();
        let wrapper = connected(&store).await;
        assert!(matches!(
            wrapper.create_table("", "data").await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            wrapper.create_database("").await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn store_failures_reach_the_error_sink() {
        let store = layout_store();
        let sink = Arc::new(RecordingSink::default());
        let wrapper = builder(&store)
            .with_error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
            .build();
        wrapper.connect().await.unwrap();
        store.set_failing(true);

        let err = wrapper.get_guild("1").await.unwrap_err();
        assert!(matches!(err, StoreError::Operation { operation: "get", .. }));

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.as_deref(), Some("get guild 1"));
    }

    #[tokio::test]
    async fn disconnected_wrapper_fails_fast_without_reporting() {
        let store = layout_store();
        let sink = Arc::new(RecordingSink::default());
        let wrapper = builder(&store)
            .with_error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
            .build();
        wrapper
            .cache(RecordKind::Guild)
            .set("1", doc(json!({"id": "1", "prefix": "!"})));

        assert!(!wrapper.is_available());
        assert_eq!(wrapper.connection_state(), ConnectionState::Disconnected);
        assert!(wrapper.get_guild("1").await.unwrap().is_some());
        assert!(matches!(
            wrapper.get_guild("2").await,
            Err(StoreError::Unavailable { operation: "get" })
        ));
        assert!(matches!(
            wrapper.set(doc(json!({"id": "2"})), RecordKind::Guild).await,
            Err(StoreError::Unavailable { operation: "set" })
        ));
        assert!(matches!(
            wrapper.create_database("data").await,
            Err(StoreError::Unavailable { .. })
        ));
        assert_eq!(store.calls("get") + store.calls("replace"), 0);
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn init_failure_is_reported_and_leaves_fetch_through_working() {
        let store = layout_store();
        let sink = Arc::new(RecordingSink::default());
        let wrapper = builder(&store)
            .with_error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
            .build();
        wrapper.connect().await.unwrap();
        store.set_feeds_supported(false);
        store.put_external(&guilds(), doc(json!({"id": "1"}))).unwrap();

        let err = wrapper.init().await.unwrap_err();
        assert!(matches!(err, StoreError::Subscription { .. }));
        assert_eq!(sink.events.lock()[0].1.as_deref(), Some("init"));

        assert!(wrapper.get_guild("1").await.unwrap().is_some());
    }
}
