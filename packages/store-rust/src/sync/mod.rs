//! Cache synchronization: shared state, change consumers and the connection
//! manager.

pub mod connection;
pub mod feed;
pub mod state;

pub use connection::{ConnectionManager, ConnectionState};
pub use feed::{apply_event, FeedClosed};
pub use state::SyncState;
