//! Error types for worker bookkeeping.

use crate::messages::TriggerNumber;
use thiserror::Error;

/// Errors raised by [`WorkerState`](super::WorkerState) operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Construction with `busy_threshold < free_threshold`.
    #[error("busy threshold {busy} is below free threshold {free}")]
    ThresholdsInconsistent {
        /// Rejected busy threshold.
        busy: usize,
        /// Rejected free threshold.
        free: usize,
    },

    /// The worker was quarantined between selection and commit.
    #[error("no slots available on \"{connection}\" for trigger {trigger_number}")]
    NoSlotsAvailable {
        /// Worker that refused the assignment.
        connection: String,
        /// Trigger number of the refused decision.
        trigger_number: TriggerNumber,
    },

    /// A completion token arrived for a trigger with no outstanding
    /// assignment. Usually a duplicate token or a stale run.
    #[error("no outstanding assignment for trigger {trigger_number} on \"{connection}\"")]
    AssignmentNotFound {
        /// Worker named by the token.
        connection: String,
        /// Trigger number named by the token.
        trigger_number: TriggerNumber,
    },
}
