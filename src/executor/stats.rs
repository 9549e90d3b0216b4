//! Serializer statistics
//!
//! Counters updated by the loop and by the submission protocols.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::submission::Completion;

/// Point-in-time copy of the serializer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Tasks that ran and produced a result
    pub completed: u64,
    /// Tasks that ran and reported a failure
    pub failed: u64,
    /// Tasks that panicked and were contained
    pub panicked: u64,
    /// Synchronous submissions resolved with a cancellation
    pub cancelled: u64,
    /// Asynchronous submissions dropped without running
    pub dropped: u64,
}

impl StatsSnapshot {
    /// Number of task bodies that actually ran
    pub fn executed(&self) -> u64 {
        self.completed + self.failed + self.panicked
    }
}

/// Shared counters for one serializer
#[derive(Debug, Default)]
pub struct SerializerStats {
    completed: RwLock<u64>,
    failed: RwLock<u64>,
    panicked: RwLock<u64>,
    cancelled: RwLock<u64>,
    dropped: RwLock<u64>,
    handoffs: RwLock<usize>,
}

impl SerializerStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_completion(&self, completion: &Completion) {
        match completion {
            Completion::Succeeded => *self.completed.write() += 1,
            Completion::Failed => *self.failed.write() += 1,
            Completion::Panicked(_) => *self.panicked.write() += 1,
        }
    }

    pub(crate) fn record_cancelled(&self) {
        *self.cancelled.write() += 1;
    }

    pub(crate) fn record_dropped(&self) {
        *self.dropped.write() += 1;
    }

    /// Register a hand-off helper; it is unregistered when the guard drops
    pub(crate) fn handoff_started(self: &Arc<Self>) -> HandoffGuard {
        *self.handoffs.write() += 1;
        HandoffGuard { stats: Arc::clone(self) }
    }

    /// Number of asynchronous hand-off helpers still racing cancellation
    pub fn pending_handoffs(&self) -> usize {
        *self.handoffs.read()
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: *self.completed.read(),
            failed: *self.failed.read(),
            panicked: *self.panicked.read(),
            cancelled: *self.cancelled.read(),
            dropped: *self.dropped.read(),
        }
    }
}

/// Keeps a hand-off helper counted while it is alive
pub(crate) struct HandoffGuard {
    stats: Arc<SerializerStats>,
}

impl Drop for HandoffGuard {
    fn drop(&mut self) {
        let mut handoffs = self.stats.handoffs.write();
        *handoffs = handoffs.saturating_sub(1);
    }
}
