//! Transport abstraction for the sliding-sync long poll.
//!
//! The engine never performs HTTP itself; it hands a request body and
//! the current position cursor to a [`SlidingSyncTransport`] and awaits
//! a typed response. TLS, connection pooling and the 30-second long-poll
//! horizon all live behind this seam.
//!
//! # Cancellation
//!
//! An aborted request must be distinguishable from a failed one: the
//! loop retries a cancellation immediately with no backoff accounting,
//! while a genuine failure grows the backoff counter. Implementations
//! report intentional aborts as [`TransportError::Cancelled`]; the
//! engine additionally cancels by dropping the in-flight future, which
//! it accounts for the same way.

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use sync_types::{Pos, SyncRequest, SyncResponse};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request was intentionally aborted. Not a failure.
    #[error("request cancelled")]
    Cancelled,

    /// The request could not be completed (network or server failure).
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether this error represents an intentional abort rather than a
    /// genuine failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A transport capable of performing one sliding-sync long poll.
///
/// `pos` is appended as a query parameter when present; its absence
/// signals an initial sync. Implementations suspend until the server
/// responds or the long-poll horizon passes.
#[async_trait]
pub trait SlidingSyncTransport: Send + Sync {
    /// Issue one request and await its typed response.
    async fn request(
        &self,
        body: &SyncRequest,
        pos: Option<Pos>,
    ) -> Result<SyncResponse, TransportError>;
}
