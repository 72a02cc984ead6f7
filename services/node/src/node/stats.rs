//! Per-node message counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::registry::DispatchOutcome;

#[derive(Debug, Default)]
pub struct NodeStats {
    received: AtomicU64,
    handled: AtomicU64,
    malformed: AtomicU64,
    unknown: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`NodeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Messages taken off the subscription.
    pub received: u64,
    pub handled: u64,
    /// Frames that failed to decode.
    pub malformed: u64,
    pub unknown: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl NodeStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Handled => &self.handled,
            DispatchOutcome::Unknown => &self.unknown,
            DispatchOutcome::Rejected => &self.rejected,
            DispatchOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Frames that were dropped without reaching a handler.
    pub fn dropped(&self) -> u64 {
        self.malformed + self.unknown + self.rejected
    }
}
