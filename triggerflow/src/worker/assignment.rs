//! Assignment of a trigger decision to a worker.

use crate::messages::{TriggerDecision, TriggerNumber};
use std::time::Instant;

/// A trigger decision bound to the worker it was dispatched to.
///
/// Created by [`WorkerState::make_assignment`](super::WorkerState::make_assignment)
/// and shared between the dispatch loop and the worker's outstanding list.
/// Immutable after creation; it leaves the books either through a matching
/// completion token or when the run ends.
#[derive(Debug)]
pub struct Assignment {
    /// The dispatched decision.
    pub decision: TriggerDecision,
    /// Connection name of the worker this decision was assigned to.
    pub connection_name: String,
    /// When the assignment was created. Latency is measured from here.
    pub assigned_at: Instant,
}

impl Assignment {
    pub(crate) fn new(decision: TriggerDecision, connection_name: String) -> Self {
        Self {
            decision,
            connection_name,
            assigned_at: Instant::now(),
        }
    }

    /// Trigger number of the assigned decision.
    pub fn trigger_number(&self) -> TriggerNumber {
        self.decision.trigger_number
    }
}
