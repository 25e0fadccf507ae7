use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Raw stored form of any record: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Discriminant for the two record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Per-guild configuration record.
    Guild,
    /// Per-user profile record.
    User,
}

impl RecordKind {
    /// Both kinds, in subscription order.
    pub const ALL: [RecordKind; 2] = [RecordKind::Guild, RecordKind::User];

    /// Lowercase name used when parsing and logging (`"guild"` / `"user"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guild => "guild",
            Self::User => "user",
        }
    }

    /// Default collection (table) name holding records of this kind.
    #[must_use]
    pub fn default_collection(self) -> &'static str {
        match self {
            Self::Guild => "guilds",
            Self::User => "users",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names neither `guild` nor `user`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record kind: {0:?} (expected \"guild\" or \"user\")")]
pub struct UnknownKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guild" => Ok(Self::Guild),
            "user" => Ok(Self::User),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Typed view of a stored document.
///
/// Implementors deserialize from a normalized [`Document`] and serialize back
/// to the whole document written by a replace.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection this record type lives in.
    const KIND: RecordKind;

    /// Primary key of the record.
    fn id(&self) -> &str;
}

/// Guild configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRecord {
    pub id: String,
    /// Custom command prefix. Empty means "use the global prefixes only".
    pub prefix: String,
}

impl GuildRecord {
    /// Creates a guild record with the canonical defaults.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prefix: String::new(),
        }
    }
}

impl Record for GuildRecord {
    const KIND: RecordKind = RecordKind::Guild;

    fn id(&self) -> &str {
        &self.id
    }
}

/// User profile record.
///
/// Fields declared by the schema registry beyond `id` and `blacklisted` are
/// carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    /// Blacklisted users are ignored by the command dispatcher.
    pub blacklisted: bool,
    #[serde(flatten)]
    pub extra: Document,
}

impl UserRecord {
    /// Creates a user record with the canonical defaults.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blacklisted: false,
            extra: Document::new(),
        }
    }
}

impl Record for UserRecord {
    const KIND: RecordKind = RecordKind::User;

    fn id(&self) -> &str {
        &self.id
    }
}
