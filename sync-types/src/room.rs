//! Room update payloads forwarded to downstream collaborators.

use crate::{ProtocolError, RoomId};
use serde::{Deserialize, Serialize};

/// A room update bundle, opaque to the engine.
///
/// The engine validates only that `room_id` is present; everything else
/// is forwarded untouched to the room-state collaborator. Timeline and
/// state entries stay as raw JSON values because interpreting them is
/// room-level business logic, which lives outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomUpdate {
    /// The room this update applies to.
    pub room_id: RoomId,
    /// Display name, if the server computed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Requested state events, uninterpreted.
    #[serde(default)]
    pub required_state: Vec<serde_json::Value>,
    /// Timeline events, uninterpreted.
    #[serde(default)]
    pub timeline: Vec<serde_json::Value>,
    /// Unread notification count.
    #[serde(default)]
    pub notification_count: u64,
    /// Unread highlight count.
    #[serde(default)]
    pub highlight_count: u64,
}

impl RoomUpdate {
    /// Validate the payload. Only `room_id` presence is enforced.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.room_id.is_empty() {
            return Err(ProtocolError::MissingRoomId);
        }
        Ok(())
    }
}
