//! Operational counters for periodic export.
//!
//! The dispatcher and the token handler bump atomic counters as they work;
//! a monitoring collector drains them with [`MetricsCounters::snapshot`],
//! which zeroes every counter so consecutive snapshots report per-interval
//! figures.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared counter block written by the dispatch loop and the token handler.
#[derive(Debug, Default)]
pub struct MetricsCounters {
    tokens_received: AtomicU64,
    decisions_sent: AtomicU64,
    decisions_received: AtomicU64,
    deciding_destination_us: AtomicU64,
    waiting_for_decision_us: AtomicU64,
    waiting_for_slots_us: AtomicU64,
}

impl MetricsCounters {
    /// Create a zeroed counter block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one received completion token.
    pub fn incr_tokens_received(&self) {
        self.tokens_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one decision sent to a worker.
    pub fn incr_decisions_sent(&self) {
        self.decisions_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one decision popped from the input queue.
    pub fn incr_decisions_received(&self) {
        self.decisions_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Charge an interval to the destination-selection phase.
    pub fn add_deciding_destination(&self, elapsed: Duration) {
        self.deciding_destination_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Charge an interval to the waiting-for-decision phase.
    pub fn add_waiting_for_decision(&self, elapsed: Duration) {
        self.waiting_for_decision_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Charge an interval to the waiting-for-slots phase.
    pub fn add_waiting_for_slots(&self, elapsed: Duration) {
        self.waiting_for_slots_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Drain the counters into a snapshot, zeroing them.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_received: self.tokens_received.swap(0, Ordering::Relaxed),
            decisions_sent: self.decisions_sent.swap(0, Ordering::Relaxed),
            decisions_received: self.decisions_received.swap(0, Ordering::Relaxed),
            deciding_destination_us: self.deciding_destination_us.swap(0, Ordering::Relaxed),
            waiting_for_decision_us: self.waiting_for_decision_us.swap(0, Ordering::Relaxed),
            waiting_for_slots_us: self.waiting_for_slots_us.swap(0, Ordering::Relaxed),
        }
    }

    /// Zero every counter without reporting.
    pub fn reset(&self) {
        let _ = self.snapshot();
    }
}

/// Point-in-time export of the counter block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Completion tokens received since the last snapshot.
    pub tokens_received: u64,
    /// Decisions sent to workers since the last snapshot.
    pub decisions_sent: u64,
    /// Decisions popped from the input queue since the last snapshot.
    pub decisions_received: u64,
    /// Microseconds spent selecting destinations.
    pub deciding_destination_us: u64,
    /// Microseconds spent waiting on the input queue.
    pub waiting_for_decision_us: u64,
    /// Microseconds spent waiting for a free slot.
    pub waiting_for_slots_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_zeroes_counters() {
        let metrics = MetricsCounters::new();
        metrics.incr_tokens_received();
        metrics.incr_decisions_sent();
        metrics.incr_decisions_sent();
        metrics.add_waiting_for_slots(Duration::from_micros(250));

        let first = metrics.snapshot();
        assert_eq!(first.tokens_received, 1);
        assert_eq!(first.decisions_sent, 2);
        assert_eq!(first.waiting_for_slots_us, 250);

        let second = metrics.snapshot();
        assert_eq!(second, MetricsSnapshot::default());
    }

    #[test]
    fn test_timing_accumulates() {
        let metrics = MetricsCounters::new();
        metrics.add_deciding_destination(Duration::from_micros(100));
        metrics.add_deciding_destination(Duration::from_micros(50));

        assert_eq!(metrics.snapshot().deciding_destination_us, 150);
    }

    #[test]
    fn test_reset_discards_counts() {
        let metrics = MetricsCounters::new();
        metrics.incr_decisions_received();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
