//! Room persistence collaborator seam.
//!
//! The engine does not persist anything. Reconciled room updates are
//! handed to a [`RoomStore`], which fronts whatever transactional
//! key-value store and room registry the application provides. The
//! engine only cares about the call ordering contract, enforced by
//! [`crate::handoff::deliver_batch`]: one `begin`/`commit` pair per
//! response batch, and every room prepared (created, or its persisted
//! timeline continuation loaded) before its update is merged.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_types::{RoomId, RoomUpdate};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("storage failure: {0}")]
    Failure(String),
}

/// The room-state collaborator the engine hands update batches to.
///
/// Implementations back this with their own storage; transaction
/// boundaries beyond the per-batch `begin`/`commit` pairing are the
/// implementor's business.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Open the read handle / transaction for one response batch.
    async fn begin(&self) -> Result<(), StoreError>;

    /// Whether a local record exists for this room.
    async fn contains(&self, room_id: &RoomId) -> Result<bool, StoreError>;

    /// Create a local record for a room seen for the first time.
    async fn create(&self, room_id: &RoomId) -> Result<(), StoreError>;

    /// Load previously persisted timeline continuation state for an
    /// existing room, ahead of merging new events into it.
    async fn load_continuation(&self, room_id: &RoomId) -> Result<(), StoreError>;

    /// Merge one room update into local state.
    async fn merge(&self, update: &RoomUpdate) -> Result<(), StoreError>;

    /// Commit the batch. The engine only advances its position cursor
    /// once this returns Ok.
    async fn commit(&self) -> Result<(), StoreError>;
}

/// One recorded call on a [`MemoryRoomStore`], for asserting ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `begin` was called.
    Begin,
    /// `create` was called for the room.
    Create(RoomId),
    /// `load_continuation` was called for the room.
    LoadContinuation(RoomId),
    /// `merge` was called for the room.
    Merge(RoomId),
    /// `commit` was called.
    Commit,
}

/// In-memory [`RoomStore`] that records its call sequence.
///
/// Clones share state, mirroring [`crate::MockTransport`]: tests keep
/// one handle for assertions and give another to the engine.
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    rooms: HashMap<RoomId, Vec<RoomUpdate>>,
    log: Vec<StoreOp>,
    fail_next_commit: Option<String>,
    fail_next_merge: Option<String>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full call sequence so far.
    pub fn log(&self) -> Vec<StoreOp> {
        self.inner.lock().unwrap().log.clone()
    }

    /// All updates merged for one room, in merge order.
    pub fn merged(&self, room_id: &RoomId) -> Vec<RoomUpdate> {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(room_id).cloned().unwrap_or_default()
    }

    /// Number of rooms with a local record.
    pub fn room_count(&self) -> usize {
        self.inner.lock().unwrap().rooms.len()
    }

    /// Pre-populate a room record, as if from an earlier session.
    pub fn seed_room(&self, room_id: RoomId) {
        let mut inner = self.inner.lock().unwrap();
        inner.rooms.entry(room_id).or_default();
    }

    /// Cause the next `commit` to fail with the given error.
    pub fn fail_next_commit(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_commit = Some(error.to_string());
    }

    /// Cause the next `merge` to fail with the given error.
    pub fn fail_next_merge(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_merge = Some(error.to_string());
    }
}

impl Clone for MemoryRoomStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn begin(&self) -> Result<(), StoreError> {
        self.inner.lock().unwrap().log.push(StoreOp::Begin);
        Ok(())
    }

    async fn contains(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().rooms.contains_key(room_id))
    }

    async fn create(&self, room_id: &RoomId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.push(StoreOp::Create(room_id.clone()));
        inner.rooms.entry(room_id.clone()).or_default();
        Ok(())
    }

    async fn load_continuation(&self, room_id: &RoomId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .log
            .push(StoreOp::LoadContinuation(room_id.clone()));
        Ok(())
    }

    async fn merge(&self, update: &RoomUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_merge.take() {
            return Err(StoreError::Failure(error));
        }
        inner.log.push(StoreOp::Merge(update.room_id.clone()));
        inner
            .rooms
            .entry(update.room_id.clone())
            .or_default()
            .push(update.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_commit.take() {
            return Err(StoreError::Failure(error));
        }
        inner.log.push(StoreOp::Commit);
        Ok(())
    }
}
