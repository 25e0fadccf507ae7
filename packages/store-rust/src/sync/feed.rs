//! Change stream consumer.
//!
//! One consumer task per collection applies the store's change feed to the
//! collection's [`EntryCache`]. Documents are cached verbatim; callers
//! normalize on read. When the feed ends the task reports the closure to the
//! connection manager and exits: it never reconnects on its own.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use yuuri_core::RecordKind;

use super::state::SyncState;
use crate::error::StoreError;
use crate::storage::{ChangeEvent, ChangeKind, EntryCache};
use crate::traits::FeedOptions;

/// Sent by a consumer task when its feed ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedClosed {
    /// Subscription generation the feed belonged to.
    pub epoch: u64,
    pub kind: RecordKind,
}

/// Applies one change event to a cache.
pub fn apply_event(cache: &dyn EntryCache, event: ChangeEvent) {
    match (event.kind, event.value) {
        (ChangeKind::Upsert, Some(value)) => {
            cache.set(&event.key, value);
        }
        (ChangeKind::Upsert, None) => {
            warn!(
                collection = %event.collection,
                key = %event.key,
                "upsert event without a value, ignored"
            );
        }
        (ChangeKind::Remove, _) => {
            cache.delete(&event.key);
        }
    }
}

/// Opens the change subscription for `kind` and spawns its consumer task.
///
/// The subscription requests squashing, the initial snapshot and tagged
/// event kinds, so the cache is fully populated without a separate bulk load.
///
/// # Errors
///
/// Returns [`StoreError::Subscription`] if the store refuses the subscription.
pub async fn spawn_consumer(
    state: &Arc<SyncState>,
    kind: RecordKind,
    epoch: u64,
    closed: mpsc::UnboundedSender<FeedClosed>,
) -> Result<JoinHandle<()>, StoreError> {
    let collection = state.config.collection(kind);
    let mut feed = state
        .client
        .subscribe_changes(&collection, FeedOptions::default())
        .await
        .map_err(|source| StoreError::Subscription {
            collection: collection.to_string(),
            source,
        })?;
    debug!(%collection, epoch, "change feed opened");

    let cache = Arc::clone(state.cache(kind));
    Ok(tokio::spawn(async move {
        let mut applied: u64 = 0;
        while let Some(event) = feed.next().await {
            apply_event(cache.as_ref(), event);
            applied += 1;
        }
        debug!(%collection, epoch, applied, "change feed ended");
        // The manager may already be gone during teardown.
        let _ = closed.send(FeedClosed { epoch, kind });
    }))
}
