//! Completion-token receive path.

use super::signal::SlotSignal;
use crate::messages::{CompletionToken, RunNumber};
use crate::metrics::MetricsCounters;
use crate::worker::{MetadataCallback, WorkerTable};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback invoked by the network layer for every inbound token.
///
/// Runs on arbitrary network threads, possibly several at once; it touches
/// shared state only through the `WorkerState` API and the slot signal, and
/// never panics out into the transport.
pub struct TokenHandler {
    table: Arc<WorkerTable>,
    run_number: RunNumber,
    metrics: Arc<MetricsCounters>,
    slot_signal: Arc<SlotSignal>,
    metadata_callback: Option<Arc<MetadataCallback>>,
}

impl TokenHandler {
    pub(crate) fn new(
        table: Arc<WorkerTable>,
        run_number: RunNumber,
        metrics: Arc<MetricsCounters>,
        slot_signal: Arc<SlotSignal>,
        metadata_callback: Option<Arc<MetadataCallback>>,
    ) -> Self {
        Self {
            table,
            run_number,
            metrics,
            slot_signal,
            metadata_callback,
        }
    }

    /// Process one token payload.
    ///
    /// Tokens from other runs are counted and discarded. A token that
    /// matches an outstanding assignment completes it, clears the worker's
    /// quarantine flag if set (the worker has evidently reconnected), and
    /// wakes the dispatcher. A token with no matching assignment is only
    /// warned about: it must not clear quarantine or signal a free slot.
    pub fn handle(&self, bytes: &[u8]) {
        let token = match CompletionToken::from_bytes(bytes) {
            Ok(token) => token,
            Err(codec_error) => {
                warn!(error = %codec_error, "discarding undecodable completion token");
                return;
            }
        };
        self.metrics.incr_tokens_received();

        if token.run_number != self.run_number {
            debug!(
                token_run = token.run_number,
                current_run = self.run_number,
                trigger = token.trigger_number,
                "discarding completion token from stale run"
            );
            return;
        }

        let Some(worker) = self.table.get(&token.decision_destination) else {
            warn!(
                worker = %token.decision_destination,
                trigger = token.trigger_number,
                "completion token from unknown worker"
            );
            return;
        };

        match worker.complete_assignment(token.trigger_number, self.metadata_callback.as_deref()) {
            Ok(latency) => {
                debug!(
                    worker = %token.decision_destination,
                    trigger = token.trigger_number,
                    ?latency,
                    "assignment completed"
                );
            }
            Err(not_found) => {
                warn!(error = %not_found, "completion token without matching assignment");
                return;
            }
        }

        if worker.is_in_error() {
            info!(worker = %token.decision_destination, "worker has reconnected");
            worker.set_in_error(false);
        }

        self.slot_signal.notify_all();
    }
}
