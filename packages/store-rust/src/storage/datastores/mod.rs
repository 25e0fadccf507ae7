//! `StoreClient` implementations.
//!
//! Currently includes [`MemoryStore`], an in-memory document store for
//! testing and embedding.

mod memory;

pub use memory::MemoryStore;
