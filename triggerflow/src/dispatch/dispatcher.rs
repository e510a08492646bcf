//! The dispatch worker thread.
//!
//! One loop iteration moves a single trigger decision through four phases:
//!
//! 1. Wait until some worker has a free slot (bounded condvar wait).
//! 2. Pop a decision from the input queue (bounded by the queue timeout).
//! 3. Select a destination worker round-robin.
//! 4. Send with retries, then commit the assignment to the worker's books.
//!
//! A send that exhausts its retries quarantines the worker and re-enters
//! phase 3 with the same decision; decisions are never silently dropped
//! while the loop runs and a healthy worker exists. Time spent in each
//! phase is charged to the matching metrics counter.

use super::signal::SlotSignal;
use crate::messages::TriggerDecision;
use crate::metrics::MetricsCounters;
use crate::network::NetworkManager;
use crate::queue::{DecisionQueue, QueueError};
use crate::worker::WorkerTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// How long a single slot wait blocks before re-checking.
const SLOT_WAIT: Duration = Duration::from_millis(1);

/// Everything the dispatch thread needs, bundled at start.
pub(crate) struct DispatchContext {
    pub table: Arc<WorkerTable>,
    pub queue: Arc<DecisionQueue>,
    pub network: Arc<dyn NetworkManager>,
    pub metrics: Arc<MetricsCounters>,
    pub slot_signal: Arc<SlotSignal>,
    pub queue_timeout: Duration,
    pub send_retries: usize,
}

/// Handle to the dispatch thread.
///
/// Shutdown is cooperative: [`shutdown`](Dispatcher::shutdown) clears the
/// run flag, the loop finishes its current blocking call, drains the input
/// queue best-effort, and exits. Dropping the handle stops the thread.
pub struct Dispatcher {
    run_flag: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Launch the dispatch thread.
    pub(crate) fn start(context: DispatchContext) -> Self {
        let run_flag = Arc::new(AtomicBool::new(true));
        let thread_flag = Arc::clone(&run_flag);

        let thread_handle = thread::Builder::new()
            .name("dfo-dispatch".to_string())
            .spawn(move || {
                debug!("dispatch loop starting");
                Self::run_loop(&context, &thread_flag);
                Self::drain(&context, &thread_flag);
                debug!("dispatch loop stopped");
            })
            .expect("failed to spawn dispatcher thread");

        Self {
            run_flag,
            thread_handle: Some(thread_handle),
        }
    }

    /// Signal the thread to stop. Non-blocking; call [`join`](Dispatcher::join)
    /// afterwards to wait for the drain to finish.
    pub fn shutdown(&self) {
        self.run_flag.store(false, Ordering::Relaxed);
    }

    /// Wait for the dispatch thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("dispatcher thread panicked");
            }
        }
    }

    /// Whether the dispatch thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn run_loop(context: &DispatchContext, run_flag: &AtomicBool) {
        let mut last_slot_check = Instant::now();

        while run_flag.load(Ordering::Relaxed) {
            if !context.table.has_slot() {
                context
                    .slot_signal
                    .wait_timeout_while(SLOT_WAIT, || context.table.has_slot());
                let now = Instant::now();
                context.metrics.add_waiting_for_slots(now - last_slot_check);
                last_slot_check = now;
                continue;
            }

            let mut slot_available = Instant::now();
            context
                .metrics
                .add_waiting_for_slots(slot_available - last_slot_check);

            // A slot is held; keep polling the queue until a decision
            // arrives or the run ends.
            while run_flag.load(Ordering::Relaxed) {
                match context.queue.pop(context.queue_timeout) {
                    Ok(decision) => {
                        context.metrics.incr_decisions_received();
                        let assignment_possible = Instant::now();
                        context
                            .metrics
                            .add_waiting_for_decision(assignment_possible - slot_available);

                        Self::route_decision(context, run_flag, decision);

                        let assignment_complete = Instant::now();
                        context
                            .metrics
                            .add_deciding_destination(assignment_complete - assignment_possible);
                        last_slot_check = assignment_complete;
                        break;
                    }
                    Err(QueueError::TimeoutExpired) => {
                        let now = Instant::now();
                        context.metrics.add_waiting_for_decision(now - slot_available);
                        slot_available = now;
                    }
                }
            }
        }
    }

    /// Select a destination for `decision` and dispatch, re-selecting for as
    /// long as the run flag allows. The decision is only abandoned at
    /// shutdown.
    fn route_decision(context: &DispatchContext, run_flag: &AtomicBool, decision: TriggerDecision) {
        let bytes = match decision.to_bytes() {
            Ok(bytes) => bytes,
            Err(codec_error) => {
                error!(
                    trigger = decision.trigger_number,
                    error = %codec_error,
                    "dropping decision that failed to encode"
                );
                return;
            }
        };

        while run_flag.load(Ordering::Relaxed) {
            let Some((worker, assignment)) = context.table.find_slot(&decision) else {
                // The held slot may have been consumed elsewhere or may yet
                // become free again; wait briefly instead of spinning.
                context
                    .slot_signal
                    .wait_timeout_while(SLOT_WAIT, || context.table.has_slot());
                continue;
            };

            if Self::dispatch(context, run_flag, worker.connection_name(), &bytes) {
                match worker.add_assignment(assignment) {
                    Ok(()) => return,
                    Err(commit_error) => {
                        // Quarantined between selection and commit; treat
                        // like a failed send and re-select.
                        warn!(error = %commit_error, "assignment commit refused, reselecting");
                        continue;
                    }
                }
            }

            error!(
                worker = %worker.connection_name(),
                "could not send trigger decision, quarantining worker"
            );
            worker.set_in_error(true);
        }

        warn!(
            trigger = decision.trigger_number,
            "dispatch abandoned at shutdown"
        );
    }

    /// Send `bytes` to `connection`, retrying up to the configured budget.
    ///
    /// Runs at least one attempt even when the run flag is already clear,
    /// which is what the shutdown drain relies on.
    fn dispatch(
        context: &DispatchContext,
        run_flag: &AtomicBool,
        connection: &str,
        bytes: &[u8],
    ) -> bool {
        let mut sent = false;
        let mut retries = context.send_retries;
        loop {
            match context
                .network
                .send_to(connection, bytes, context.queue_timeout)
            {
                Ok(()) => {
                    sent = true;
                    context.metrics.incr_decisions_sent();
                }
                Err(send_error) => {
                    warn!(worker = connection, error = %send_error, "send failed");
                }
            }

            retries = retries.saturating_sub(1);
            if sent || retries == 0 || !run_flag.load(Ordering::Relaxed) {
                return sent;
            }
        }
    }

    /// Best-effort dispatch of whatever is still queued after shutdown.
    ///
    /// Single send attempt per decision, no bookkeeping: the run is over,
    /// nobody will complete these assignments.
    fn drain(context: &DispatchContext, run_flag: &AtomicBool) {
        while let Ok(decision) = context.queue.pop(context.queue_timeout) {
            context.metrics.incr_decisions_received();

            let Some((worker, _assignment)) = context.table.find_slot(&decision) else {
                warn!(
                    trigger = decision.trigger_number,
                    "dropping decision during drain, no worker available"
                );
                continue;
            };

            match decision.to_bytes() {
                Ok(bytes) => {
                    Self::dispatch(context, run_flag, worker.connection_name(), &bytes);
                }
                Err(codec_error) => {
                    error!(
                        trigger = decision.trigger_number,
                        error = %codec_error,
                        "dropping decision that failed to encode"
                    );
                }
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}
