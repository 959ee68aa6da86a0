//! Inclusive index ranges describing the client's viewport.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};

/// An inclusive `[low, high]` window over the remote ordered room list.
///
/// Serialized on the wire as a two-element JSON array. A collection of
/// ranges describes the full current viewport; ranges may be disjoint
/// and are not assumed non-overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct IndexRange {
    low: u64,
    high: u64,
}

impl IndexRange {
    /// Create a range, validating `low <= high`.
    pub fn new(low: u64, high: u64) -> Result<Self, ProtocolError> {
        if low > high {
            return Err(ProtocolError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    /// The inclusive lower bound.
    pub fn low(&self) -> u64 {
        self.low
    }

    /// The inclusive upper bound.
    pub fn high(&self) -> u64 {
        self.high
    }

    /// Whether `index` falls inside this range.
    pub fn contains(&self, index: u64) -> bool {
        index >= self.low && index <= self.high
    }

    /// Number of indices covered (inclusive bounds).
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }

    /// Always false: a valid range covers at least one index.
    pub fn is_empty(&self) -> bool {
        false
    }
}

// Wire form is a bare [low, high] pair. A malformed pair coming off the
// network is clamped rather than rejected so one bad list entry cannot
// fail the surrounding response parse.
impl From<(u64, u64)> for IndexRange {
    fn from((low, high): (u64, u64)) -> Self {
        Self {
            low: low.min(high),
            high: high.max(low),
        }
    }
}

impl From<IndexRange> for (u64, u64) {
    fn from(r: IndexRange) -> Self {
        (r.low, r.high)
    }
}
