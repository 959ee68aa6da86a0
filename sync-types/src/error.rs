//! Error types for the sliding-sync wire format.

use thiserror::Error;

/// Errors that can occur while parsing or validating protocol data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[source] serde_json::Error),

    /// A range had `low > high`.
    #[error("invalid range: low {low} > high {high}")]
    InvalidRange {
        /// The offending low bound.
        low: u64,
        /// The offending high bound.
        high: u64,
    },

    /// An operation was missing a field required by its tag.
    #[error("op {op} missing required field `{field}`")]
    MissingField {
        /// The operation tag.
        op: &'static str,
        /// The missing field name.
        field: &'static str,
    },

    /// An operation carried a tag this client does not know.
    #[error("unknown op tag: {0}")]
    UnknownOp(String),

    /// A room payload arrived without a room id.
    #[error("room payload has no room_id")]
    MissingRoomId,
}
