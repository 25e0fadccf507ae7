//! In-memory entry cache trait.
//!
//! Defines [`EntryCache`], the per-collection key → document mirror. The
//! change stream consumers write into it in the background while foreground
//! reads and writes go through the facade, so implementations must tolerate
//! concurrent mutation.

use yuuri_core::Document;

/// Per-collection in-memory mirror of stored documents.
///
/// A missing key means "unknown", not "deleted". There is no eviction:
/// entries leave only through [`delete`](Self::delete), which the change
/// consumer calls on a `Remove` event.
///
/// Wrapped in `Arc<dyn EntryCache>` for sharing across tasks.
pub trait EntryCache: Send + Sync + 'static {
    /// Retrieve a clone of the cached document, or `None` if unknown.
    fn get(&self, key: &str) -> Option<Document>;

    /// Insert or replace a document. Returns the previous document if any.
    fn set(&self, key: &str, value: Document) -> Option<Document>;

    /// Remove a document, returning it.
    fn delete(&self, key: &str) -> Option<Document>;

    /// Check if a key is cached without cloning the document.
    fn has(&self, key: &str) -> bool;

    /// Number of cached entries.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool;

    /// Drop every entry. Takes `&self` for `Arc<dyn EntryCache>` compatibility.
    fn clear(&self);

    /// Point-in-time copy of all entries.
    fn snapshot(&self) -> Vec<(String, Document)>;
}
