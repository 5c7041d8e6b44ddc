//! Coordinator state and statistics.

use parking_lot::RwLock;
use std::time::Instant;

/// What the coordinator is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing in flight.
    Idle,
    /// A join, sign-in or verification flow is running.
    Authenticating,
    /// A fetch is running.
    Fetching,
    /// A local change is being sent to the server.
    Updating,
    /// The last flow completed.
    Synced,
    /// The last flow failed.
    Error,
}

impl SyncState {
    /// Returns true while a flow is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Authenticating | SyncState::Fetching | SyncState::Updating
        )
    }
}

/// Statistics about completed flows.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Flows that completed.
    pub flows_completed: u64,
    /// Flows that failed.
    pub flows_failed: u64,
    /// Messages inserted by delta fetches.
    pub messages_merged: u64,
    /// Last time a flow completed.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Shared state and stats, updated as flows start and finish.
#[derive(Debug)]
pub(crate) struct Tracker {
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    pub(crate) fn state(&self) -> SyncState {
        *self.state.read()
    }

    pub(crate) fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    pub(crate) fn begin(&self, state: SyncState) {
        *self.state.write() = state;
    }

    pub(crate) fn succeed(&self, messages: usize) {
        *self.state.write() = SyncState::Synced;
        let mut stats = self.stats.write();
        stats.flows_completed += 1;
        stats.messages_merged += messages as u64;
        stats.last_sync_time = Some(Instant::now());
        stats.last_error = None;
    }

    pub(crate) fn fail(&self, error: &impl std::fmt::Display) {
        *self.state.write() = SyncState::Error;
        let mut stats = self.stats.write();
        stats.flows_failed += 1;
        stats.last_error = Some(error.to_string());
    }
}
