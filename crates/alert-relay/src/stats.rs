//! Atomic relay statistics counters.
//!
//! Lock-free counters for tracking relay volume and delivery results.
//! All atomics use `Relaxed` ordering — these are monotonic display counters
//! with no synchronization requirements.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::relay::outcome::RelayOutcome;

#[derive(Default)]
struct StatsInner {
    relays_received: AtomicU64,
    capture_failures: AtomicU64,
    deliveries_succeeded: AtomicU64,
    deliveries_failed: AtomicU64,
}

/// Thread-safe atomic relay statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct RelayStats {
    inner: Arc<StatsInner>,
}

/// Snapshot of current stats values, serializable to JSON.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub relays_received: u64,
    pub capture_failures: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_relays(&self) {
        self.inner.relays_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_capture_failures(&self) {
        self.inner.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &RelayOutcome) {
        self.inner
            .deliveries_succeeded
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.inner
            .deliveries_failed
            .fetch_add(outcome.failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            relays_received: self.inner.relays_received.load(Ordering::Relaxed),
            capture_failures: self.inner.capture_failures.load(Ordering::Relaxed),
            deliveries_succeeded: self.inner.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.inner.deliveries_failed.load(Ordering::Relaxed),
        }
    }
}
