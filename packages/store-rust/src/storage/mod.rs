//! Storage primitives for the synchronized cache wrapper.
//!
//! - [`EntryCache`]: per-collection in-memory mirror, with [`HashMapCache`]
//!   as the concurrent implementation
//! - [`ChangeEvent`]: a change notification from the store's feed
//! - [`AvailabilityObserver`] / [`ErrorSink`]: outbound notifications
//! - [`MemoryStore`]: in-memory store client

pub mod datastores;
pub mod engine;
pub mod engines;
pub mod observer;
pub mod record;

pub use datastores::MemoryStore;
pub use engine::*;
pub use engines::HashMapCache;
pub use observer::*;
pub use record::*;
