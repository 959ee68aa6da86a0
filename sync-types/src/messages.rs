//! Request and response bodies for the sliding-sync long poll.

use crate::{IndexRange, Pos, RoomId, RoomUpdate, SessionId, WireOp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One windowed list in a sync request.
///
/// The tracked ranges are sent on every request. The remaining fields
/// are sticky: sent on the first request of a session and remembered
/// server-side for the life of the session id, so they are `None` (and
/// omitted from the body) on every subsequent request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    /// The index windows currently wanted, as `[low, high]` pairs.
    pub rooms: Vec<IndexRange>,
    /// Sticky: sort order for the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<String>>,
    /// Sticky: maximum timeline events per room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_limit: Option<u64>,
    /// Sticky: state event filters to include per room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_state: Option<Vec<(String, String)>>,
}

impl ListRequest {
    /// A list carrying only ranges, with all sticky fields omitted.
    pub fn ranges_only(rooms: Vec<IndexRange>) -> Self {
        Self {
            rooms,
            sort: None,
            timeline_limit: None,
            required_state: None,
        }
    }
}

/// The request body sent on each iteration of the sync loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Session identifier, constant for one loop invocation.
    pub session_id: SessionId,
    /// The windowed lists being tracked.
    pub lists: Vec<ListRequest>,
    /// Explicit per-room subscriptions outside any window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_subscriptions: Option<BTreeMap<RoomId, serde_json::Value>>,
}

impl SyncRequest {
    /// Serialize to a JSON body for the transport.
    pub fn to_json(&self) -> Result<String, crate::ProtocolError> {
        serde_json::to_string(self).map_err(crate::ProtocolError::Json)
    }
}

/// The response body returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// The new position cursor, echoed on the next request.
    pub pos: Pos,
    /// Total size of each requested list, server-side.
    #[serde(default)]
    pub counts: Vec<u64>,
    /// Positional operations, in application order.
    #[serde(default)]
    pub ops: Vec<WireOp>,
    /// Updates for explicitly subscribed rooms.
    #[serde(default)]
    pub room_subscriptions: BTreeMap<RoomId, RoomUpdate>,
}

impl SyncResponse {
    /// Parse a JSON body received from the transport.
    pub fn from_json(body: &str) -> Result<Self, crate::ProtocolError> {
        serde_json::from_str(body).map_err(crate::ProtocolError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_fields_omitted_when_none() {
        let request = SyncRequest {
            session_id: SessionId::from_string("1700000000000"),
            lists: vec![ListRequest::ranges_only(vec![
                IndexRange::new(0, 20).unwrap()
            ])],
            room_subscriptions: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("sort"));
        assert!(!json.contains("timeline_limit"));
        assert!(!json.contains("required_state"));
        assert!(!json.contains("room_subscriptions"));
        assert!(json.contains(r#""rooms":[[0,20]]"#));
    }

    #[test]
    fn sticky_fields_present_when_set() {
        let list = ListRequest {
            rooms: vec![IndexRange::new(0, 10).unwrap()],
            sort: Some(vec!["by_recency".into()]),
            timeline_limit: Some(20),
            required_state: Some(vec![("m.room.topic".into(), "".into())]),
        };
        let json = serde_json::to_string(&list).unwrap();
        assert!(json.contains("by_recency"));
        assert!(json.contains(r#""timeline_limit":20"#));
        assert!(json.contains("m.room.topic"));
    }

    #[test]
    fn response_parses_with_absent_optional_fields() {
        let response: SyncResponse = serde_json::from_str(r#"{"pos": 5}"#).unwrap();
        assert_eq!(response.pos, Pos::new(5));
        assert!(response.counts.is_empty());
        assert!(response.ops.is_empty());
        assert!(response.room_subscriptions.is_empty());
    }

    #[test]
    fn response_parses_full_body() {
        let body = r#"{
            "pos": 9,
            "counts": [1337],
            "ops": [
                {"op": "SYNC", "range": [0, 0], "rooms": [{"room_id": "!a"}]},
                {"op": "DELETE", "index": 3}
            ],
            "room_subscriptions": {"!sub": {"room_id": "!sub", "notification_count": 2}}
        }"#;
        let response: SyncResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.counts, vec![1337]);
        assert_eq!(response.ops.len(), 2);
        assert_eq!(response.ops[1].op, "DELETE");
        let sub = response.room_subscriptions.get(&RoomId::new("!sub")).unwrap();
        assert_eq!(sub.notification_count, 2);
    }

    #[test]
    fn from_json_classifies_garbage() {
        let err = SyncResponse::from_json("not json").unwrap_err();
        assert!(matches!(err, crate::ProtocolError::Json(_)));
    }

    #[test]
    fn request_roundtrip() {
        let request = SyncRequest {
            session_id: SessionId::from_string("17"),
            lists: vec![ListRequest {
                rooms: vec![
                    IndexRange::new(0, 5).unwrap(),
                    IndexRange::new(6, 8).unwrap(),
                ],
                sort: Some(vec!["by_notification_count".into()]),
                timeline_limit: Some(1),
                required_state: None,
            }],
            room_subscriptions: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        let restored: SyncRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, request);
    }
}
