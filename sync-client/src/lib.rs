//! # sync-client
//!
//! Client engine for the sliding-sync protocol.
//!
//! This is the crate applications use to keep a bounded, windowed view
//! of a huge remote room list in sync.
//!
//! ## Features
//!
//! - **Windowed long-poll loop**: requests carry explicit index ranges
//!   and a per-invocation session id; sticky parameters are sent once.
//! - **Pure reconciliation core**: server operations are applied by
//!   `sync-core` with copy-on-write snapshots.
//! - **Transport abstraction**: pluggable transport seam (HTTP, mock).
//! - **Collaborator seams**: room persistence is behind the
//!   [`RoomStore`] trait; the engine never persists anything itself.
//!
//! ## Example
//!
//! ```ignore
//! use slidingsync_client::{EngineConfig, MemoryRoomStore, MockTransport, SlidingSyncEngine};
//! use slidingsync_types::IndexRange;
//!
//! let config = EngineConfig::new(vec![IndexRange::new(0, 20)?])
//!     .with_timeline_limit(20);
//! let engine = SlidingSyncEngine::new(config, transport, store);
//! engine.start();
//! // ... observe engine.subscribe() / engine.index_map()
//! engine.stop();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod handoff;
pub mod store;
pub mod transport;

pub use engine::{EngineConfig, EngineError, SlidingSyncEngine};
pub use handoff::deliver_batch;
pub use store::{MemoryRoomStore, RoomStore, StoreError, StoreOp};
pub use transport::{MockTransport, SlidingSyncTransport, TransportError};
