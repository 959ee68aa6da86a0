//! # sync-types
//!
//! Wire format types for the sliding-sync protocol.
//!
//! This crate provides the foundational types used across all
//! sliding-sync crates:
//! - [`RoomId`], [`Pos`], [`SessionId`] - Identity and continuation types
//! - [`IndexRange`] - Inclusive index windows over the remote room list
//! - [`WireOp`], [`Operation`] - Positional operations pushed by the server
//! - [`SyncRequest`], [`SyncResponse`] - Request/response bodies
//! - [`ProtocolError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod ops;
mod range;
mod room;

pub use error::ProtocolError;
pub use ids::{Pos, RoomId, SessionId};
pub use messages::{ListRequest, SyncRequest, SyncResponse};
pub use ops::{Operation, WireOp};
pub use range::IndexRange;
pub use room::RoomUpdate;
