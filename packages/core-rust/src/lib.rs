//! Yuuri core: record kinds, canonical schema registry, and document normalization.

pub mod normalize;
pub mod schema;
pub mod types;

pub use normalize::{project, Upgrade, UpgradeFn};
pub use schema::{SchemaRegistry, ID_FIELD};
pub use types::{Document, GuildRecord, Record, RecordKind, UnknownKind, UserRecord};
