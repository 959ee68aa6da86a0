//! Observable lifecycle status of a sync engine.

use std::fmt;

/// Lifecycle status of the sync loop.
///
/// Created `Stopped`; `start()` moves to `InitialSync`; the first
/// successful response moves to `Syncing`; `stop()` moves to `Stopped`
/// from either running state, terminal until the next `start()`. The
/// transition to `Syncing` is the only one driven by loop progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Loop running, no successful response yet.
    InitialSync,
    /// Loop running, at least one response applied.
    Syncing,
    /// Loop not running.
    #[default]
    Stopped,
}

impl SyncStatus {
    /// Whether the loop is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::InitialSync | Self::Syncing)
    }

    /// Whether the loop is stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSync => "initial-sync",
            Self::Syncing => "syncing",
            Self::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}
