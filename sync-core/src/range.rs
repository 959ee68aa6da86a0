//! Tracking of the currently requested index windows.

use sync_types::IndexRange;

/// The set of index windows the client currently has requested.
///
/// Read by the sync loop to build request bodies, and by the reconciler
/// to decide whether a shifted index is still in view. Membership is a
/// linear scan over the full list: ranges may overlap, and there are
/// only ever a few windows, so no interval structure is warranted.
#[derive(Debug, Clone, Default)]
pub struct RangeTracker {
    ranges: Vec<IndexRange>,
}

impl RangeTracker {
    /// Create a tracker with no windows (empty viewport).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker over the given windows.
    pub fn with_ranges(ranges: Vec<IndexRange>) -> Self {
        Self { ranges }
    }

    /// Replace the tracked windows.
    pub fn set_ranges(&mut self, ranges: Vec<IndexRange>) {
        self.ranges = ranges;
    }

    /// The tracked windows, in request order.
    pub fn ranges(&self) -> &[IndexRange] {
        &self.ranges
    }

    /// Whether `index` falls inside at least one tracked window.
    pub fn is_index_in_range(&self, index: u64) -> bool {
        self.ranges.iter().any(|r| r.contains(index))
    }
}
