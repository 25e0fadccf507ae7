//! Configuration types for the synchronized cache wrapper.

use std::time::Duration;

use yuuri_core::RecordKind;

use crate::traits::CollectionRef;

/// Store connection and layout configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store host. The client driver port, not an admin or cluster port.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Database holding both collections.
    pub database: String,
    /// Table holding guild records.
    pub guild_table: String,
    /// Table holding user records.
    pub user_table: String,
    /// Fixed delay between reconnection attempts.
    pub retry_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 28015,
            database: "data".to_string(),
            guild_table: RecordKind::Guild.default_collection().to_string(),
            user_table: RecordKind::User.default_collection().to_string(),
            retry_interval: Duration::from_secs(15),
        }
    }
}

impl StoreConfig {
    /// Address of the collection holding records of `kind`.
    #[must_use]
    pub fn collection(&self, kind: RecordKind) -> CollectionRef {
        let table = match kind {
            RecordKind::Guild => &self.guild_table,
            RecordKind::User => &self.user_table,
        };
        CollectionRef::new(&self.database, table)
    }
}

/// Command-line / environment flags for the store connection.
///
/// Flatten into a host binary's parser with `#[command(flatten)]`.
#[derive(Debug, Clone, clap::Args)]
pub struct StoreArgs {
    /// Store host.
    #[arg(long = "db-host", env = "YUURI_DB_HOST", default_value = "localhost")]
    pub host: String,

    /// Store client driver port.
    #[arg(long = "db-port", env = "YUURI_DB_PORT", default_value_t = 28015)]
    pub port: u16,

    /// Database holding the `guilds` and `users` tables.
    #[arg(long = "db-name", env = "YUURI_DB_NAME", default_value = "data")]
    pub database: String,

    /// Seconds between reconnection attempts while the store is unreachable.
    #[arg(long = "db-retry-secs", env = "YUURI_DB_RETRY_SECS", default_value_t = 15)]
    pub retry_secs: u64,
}

impl From<StoreArgs> for StoreConfig {
    fn from(args: StoreArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            database: args.database,
            retry_interval: Duration::from_secs(args.retry_secs),
            ..Self::default()
        }
    }
}
