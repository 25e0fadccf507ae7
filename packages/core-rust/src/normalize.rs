//! Projection of stored documents onto the canonical shape.
//!
//! Every read passes through [`SchemaRegistry::normalize`]: fields the
//! registry no longer declares are dropped, newly declared fields get their
//! default, and everything else keeps its stored value. The upgrade happens
//! in memory only; stored documents are not rewritten.

use serde_json::Value;

use crate::schema::{SchemaRegistry, ID_FIELD};
use crate::types::{Document, RecordKind};

impl SchemaRegistry {
    /// Projects `stored` onto the canonical shape of `kind`.
    ///
    /// The target is `default_shape(kind, stored.id)`. Only the target's keys
    /// are walked: nested objects present on both sides are projected
    /// recursively, any other stored value replaces the default wholesale
    /// (arrays included).
    #[must_use]
    pub fn normalize(&self, stored: &Document, kind: RecordKind) -> Document {
        let id = stored
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut target = self.default_shape(kind, id);
        project(&mut target, stored);
        target
    }
}

/// Copies values from `source` into the keys `target` already declares.
pub fn project(target: &mut Document, source: &Document) {
    for (key, slot) in target.iter_mut() {
        let Some(incoming) = source.get(key) else {
            continue;
        };
        match (slot, incoming) {
            (Value::Object(nested), Value::Object(incoming)) => project(nested, incoming),
            (slot, incoming) => *slot = incoming.clone(),
        }
    }
}

/// Read-path hook turning a stored document into the document handed to
/// callers.
///
/// [`SchemaRegistry`] implements it with [`SchemaRegistry::normalize`]. A
/// custom implementation replaces that strategy entirely, e.g. to convert a
/// legacy field encoding.
pub trait Upgrade: Send + Sync {
    /// Upgrades a stored document of the given kind.
    fn upgrade(&self, kind: RecordKind, stored: Document) -> Document;
}

impl Upgrade for SchemaRegistry {
    fn upgrade(&self, kind: RecordKind, stored: Document) -> Document {
        self.normalize(&stored, kind)
    }
}

/// Adapts a closure into an [`Upgrade`].
pub struct UpgradeFn<F>(pub F);

impl<F> Upgrade for UpgradeFn<F>
where
    F: Fn(RecordKind, Document) -> Document + Send + Sync,
{
    fn upgrade(&self, kind: RecordKind, stored: Document) -> Document {
        (self.0)(kind, stored)
    }
}
