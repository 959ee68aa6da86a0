//! Sequencing of reconciled updates into the room store.

use crate::store::{RoomStore, StoreError};
use sync_types::RoomUpdate;

/// Hand one reconciliation pass's ordered updates to the store.
///
/// Enforces the prepare ordering: the batch's read handle is opened
/// once, each room is created (first sight) or has its persisted
/// timeline continuation loaded (known room) before its update is
/// merged, and the batch is committed once at the end. The caller must
/// not advance its position cursor unless this returns Ok; an
/// uncommitted batch will be redelivered by the retried request.
///
/// Updates without a room id are dropped with a diagnostic; an empty
/// batch opens no transaction at all.
pub async fn deliver_batch<S: RoomStore>(
    store: &S,
    updates: &[RoomUpdate],
) -> Result<(), StoreError> {
    if updates.is_empty() {
        return Ok(());
    }

    store.begin().await?;
    for update in updates {
        if update.validate().is_err() {
            tracing::warn!("dropping room update with no room id");
            continue;
        }
        if store.contains(&update.room_id).await? {
            store.load_continuation(&update.room_id).await?;
        } else {
            store.create(&update.room_id).await?;
        }
        store.merge(update).await?;
    }
    store.commit().await
}
