//! Retry backoff policy for the sync loop.

use std::time::Duration;

/// Fixed delay inserted before every request, regardless of outcome.
///
/// Bounds the request rate under pathological fast-fail loops without
/// meaningfully delaying the healthy long-poll cycle.
pub const REQUEST_SPACING: Duration = Duration::from_millis(10);

/// Exponential backoff counter for failed requests.
///
/// Each recorded failure doubles the delay, capped at the fifth
/// doubling: consecutive failures sleep 2, 4, 8, 16, 32, 32, ... seconds.
/// The sequence is deterministic; the protocol loop retries forever and
/// a single client gains nothing from jitter here.
///
/// Cancellation is never recorded as a failure; only genuine
/// network/server errors grow the counter, and any success resets it.
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    failures: u32,
}

/// Cap on the number of doublings.
const MAX_DOUBLINGS: u32 = 5;

impl Backoff {
    /// A fresh counter with no recorded failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed request.
    pub fn record_failure(&mut self) {
        self.failures = (self.failures + 1).min(MAX_DOUBLINGS);
    }

    /// Forget all failures after a confirmed success.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Number of failures currently counted (capped).
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// The delay to sleep before the next retry: `2^failures` seconds.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(2u64.pow(self.failures))
    }
}
