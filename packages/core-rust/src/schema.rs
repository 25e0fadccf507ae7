//! Canonical record shapes.
//!
//! [`SchemaRegistry`] declares which fields a record of each kind carries and
//! their zero values. It is both the template for new records and the
//! projection target used by [`normalize`](SchemaRegistry::normalize).

use serde_json::Value;

use crate::types::{Document, RecordKind};

/// Name of the primary key field, present in every canonical shape.
pub const ID_FIELD: &str = "id";

/// Declared canonical shape for guild and user records.
///
/// Shapes are stored without the `id` field; [`default_shape`](Self::default_shape)
/// seeds it. Adding or retiring a field here is the whole schema migration:
/// stored documents are upgraded on read.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    guild: Document,
    user: Document,
}

impl SchemaRegistry {
    /// Creates the registry with the current canonical shapes:
    /// guild `{id, prefix: ""}` and user `{id, blacklisted: false}`.
    #[must_use]
    pub fn new() -> Self {
        let mut guild = Document::new();
        guild.insert("prefix".to_string(), Value::String(String::new()));

        let mut user = Document::new();
        user.insert("blacklisted".to_string(), Value::Bool(false));

        Self { guild, user }
    }

    /// Declares (or redefines) a field with its default value.
    ///
    /// Declaring `id` is a no-op: the key is always seeded from the record.
    #[must_use]
    pub fn with_field(mut self, kind: RecordKind, name: &str, default: Value) -> Self {
        if name != ID_FIELD {
            self.shape_mut(kind).insert(name.to_string(), default);
        }
        self
    }

    /// Retires a field. Stored values for it are dropped on the next read.
    #[must_use]
    pub fn without_field(mut self, kind: RecordKind, name: &str) -> Self {
        self.shape_mut(kind).remove(name);
        self
    }

    /// Returns the zero-value canonical document for `kind`, keyed by `id`.
    #[must_use]
    pub fn default_shape(&self, kind: RecordKind, id: &str) -> Document {
        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        for (name, default) in self.shape(kind) {
            doc.insert(name.clone(), default.clone());
        }
        doc
    }

    /// Names of the declared fields for `kind`, `id` first.
    pub fn field_names(&self, kind: RecordKind) -> impl Iterator<Item = &str> {
        std::iter::once(ID_FIELD).chain(self.shape(kind).keys().map(String::as_str))
    }

    fn shape(&self, kind: RecordKind) -> &Document {
        match kind {
            RecordKind::Guild => &self.guild,
            RecordKind::User => &self.user,
        }
    }

    fn shape_mut(&mut self, kind: RecordKind) -> &mut Document {
        match kind {
            RecordKind::Guild => &mut self.guild,
            RecordKind::User => &mut self.user,
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
