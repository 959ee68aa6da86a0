//! # sync-core
//!
//! Pure logic for the sliding-sync engine (no I/O, instant tests).
//!
//! This crate implements the range tracking, operation reconciliation,
//! backoff policy and status type for sliding sync without any network
//! or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce
//! output without side effects (diagnostics aside). This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about how server operations reshape the local view
//!
//! The actual I/O (long-poll requests, room persistence) is performed by
//! `sync-client`, which drives these components from its loop.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod range;
pub mod reconcile;
pub mod status;

pub use backoff::{Backoff, REQUEST_SPACING};
pub use range::RangeTracker;
pub use reconcile::{reconcile, IndexMap, Reconciliation};
pub use status::SyncStatus;
