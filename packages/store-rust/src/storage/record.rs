//! Change notification types delivered by a store's change feed.

use serde::{Deserialize, Serialize};
use yuuri_core::Document;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Inserted, replaced, or part of the initial snapshot.
    Upsert,
    /// Deleted from the collection.
    Remove,
}

/// A single change notification for one key of one collection.
///
/// Serializes as `{"collection", "kind", "key", "value"}` with `value`
/// omitted for removals, the shape client drivers decode feed payloads into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the change happened in.
    pub collection: String,
    pub kind: ChangeKind,
    /// Primary key of the changed document.
    pub key: String,
    /// New document. Present only for [`ChangeKind::Upsert`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Document>,
}

impl ChangeEvent {
    #[must_use]
    pub fn upsert(collection: impl Into<String>, key: impl Into<String>, value: Document) -> Self {
        Self {
            collection: collection.into(),
            kind: ChangeKind::Upsert,
            key: key.into(),
            value: Some(value),
        }
    }

    #[must_use]
    pub fn remove(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            kind: ChangeKind::Remove,
            key: key.into(),
            value: None,
        }
    }
}
