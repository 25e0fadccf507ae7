//! `EntryCache` implementations.

mod hashmap;

pub use hashmap::HashMapCache;
