//! Positional operations pushed by the server.
//!
//! Two representations exist on purpose. [`WireOp`] is the permissive
//! image of what actually arrived: every field optional, unknown tags
//! preserved. [`Operation`] is the closed sum type the reconciler works
//! with, where each variant carries exactly the fields its tag requires.
//! The conversion is where the per-op required-field table is enforced,
//! so a single malformed operation can be logged and skipped without
//! failing the surrounding response parse.

use crate::{IndexRange, ProtocolError, RoomUpdate};
use serde::{Deserialize, Serialize};

/// A raw operation as deserialized from a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOp {
    /// The operation tag (`SYNC`, `INVALIDATE`, `INSERT`, `DELETE`, `UPDATE`).
    pub op: String,
    /// Index range, for SYNC and INVALIDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<IndexRange>,
    /// Room payloads, for SYNC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<RoomUpdate>>,
    /// Target index, for INSERT, DELETE and UPDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Room payload, for INSERT and UPDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomUpdate>,
}

impl WireOp {
    /// Build a SYNC wire op (test and serialization helper).
    pub fn sync(range: IndexRange, rooms: Vec<RoomUpdate>) -> Self {
        Self {
            op: "SYNC".into(),
            range: Some(range),
            rooms: Some(rooms),
            index: None,
            room: None,
        }
    }

    /// Build an INVALIDATE wire op.
    pub fn invalidate(range: IndexRange) -> Self {
        Self {
            op: "INVALIDATE".into(),
            range: Some(range),
            rooms: None,
            index: None,
            room: None,
        }
    }

    /// Build an INSERT wire op.
    pub fn insert(index: u64, room: RoomUpdate) -> Self {
        Self {
            op: "INSERT".into(),
            range: None,
            rooms: None,
            index: Some(index),
            room: Some(room),
        }
    }

    /// Build a DELETE wire op.
    pub fn delete(index: u64) -> Self {
        Self {
            op: "DELETE".into(),
            range: None,
            rooms: None,
            index: Some(index),
            room: None,
        }
    }

    /// Build an UPDATE wire op.
    pub fn update(index: u64, room: RoomUpdate) -> Self {
        Self {
            op: "UPDATE".into(),
            range: None,
            rooms: None,
            index: Some(index),
            room: Some(room),
        }
    }
}

/// A validated operation, one variant per tag.
///
/// Exhaustive matching over this enum is what keeps the reconciler's
/// dispatch total: adding a tag forces every consumer to handle it.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Populate a range with rooms, in order.
    Sync {
        /// The range being populated.
        range: IndexRange,
        /// Rooms for `range`, starting at its low bound. May be shorter
        /// than the range when the server-known list ends early.
        rooms: Vec<RoomUpdate>,
    },
    /// Drop every tracked index in a range.
    Invalidate {
        /// The range being invalidated.
        range: IndexRange,
    },
    /// Place a room at an index, shifting via the batch's gap if occupied.
    Insert {
        /// The target index.
        index: u64,
        /// The room to place there.
        room: RoomUpdate,
    },
    /// Remove the room at an index, vacating it as the batch's gap.
    Delete {
        /// The index being vacated.
        index: u64,
    },
    /// Refresh a room's content without moving it.
    Update {
        /// The room's (unchanged) index.
        index: u64,
        /// The refreshed payload.
        room: RoomUpdate,
    },
}

impl TryFrom<WireOp> for Operation {
    type Error = ProtocolError;

    fn try_from(wire: WireOp) -> Result<Self, Self::Error> {
        match wire.op.as_str() {
            "SYNC" => {
                let range = wire.range.ok_or(ProtocolError::MissingField {
                    op: "SYNC",
                    field: "range",
                })?;
                let rooms = wire.rooms.ok_or(ProtocolError::MissingField {
                    op: "SYNC",
                    field: "rooms",
                })?;
                Ok(Self::Sync { range, rooms })
            }
            "INVALIDATE" => {
                let range = wire.range.ok_or(ProtocolError::MissingField {
                    op: "INVALIDATE",
                    field: "range",
                })?;
                Ok(Self::Invalidate { range })
            }
            "INSERT" => {
                let index = wire.index.ok_or(ProtocolError::MissingField {
                    op: "INSERT",
                    field: "index",
                })?;
                let room = wire.room.ok_or(ProtocolError::MissingField {
                    op: "INSERT",
                    field: "room",
                })?;
                room.validate()?;
                Ok(Self::Insert { index, room })
            }
            "DELETE" => {
                let index = wire.index.ok_or(ProtocolError::MissingField {
                    op: "DELETE",
                    field: "index",
                })?;
                Ok(Self::Delete { index })
            }
            "UPDATE" => {
                let index = wire.index.ok_or(ProtocolError::MissingField {
                    op: "UPDATE",
                    field: "index",
                })?;
                let room = wire.room.ok_or(ProtocolError::MissingField {
                    op: "UPDATE",
                    field: "room",
                })?;
                room.validate()?;
                Ok(Self::Update { index, room })
            }
            other => Err(ProtocolError::UnknownOp(other.to_string())),
        }
    }
}
