//! Concurrency-safe record of one worker's outstanding assignments.

use super::{Assignment, WorkerError};
use crate::messages::{TriggerDecision, TriggerNumber};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Maximum number of completion latencies kept per worker.
pub const LATENCY_WINDOW_CAPACITY: usize = 1000;

/// Per-completion metadata updater.
///
/// Invoked with the worker's metadata blob after each successful completion.
pub type MetadataCallback = dyn Fn(&mut serde_json::Value) + Send + Sync;

/// Capacity bookkeeping for one TRB worker.
///
/// The worker advertises itself as busy once the outstanding count rises to
/// `busy_threshold` and clears only when it falls strictly below
/// `free_threshold` (hysteresis). While `in_error` is set the worker is
/// skipped by selection regardless of spare capacity.
pub struct WorkerState {
    connection_name: String,
    busy_threshold: AtomicUsize,
    free_threshold: AtomicUsize,
    is_busy: AtomicBool,
    in_error: AtomicBool,
    outstanding: Mutex<Vec<Arc<Assignment>>>,
    latency_window: Mutex<VecDeque<(Instant, Duration)>>,
    metadata: Mutex<serde_json::Value>,
}

impl WorkerState {
    /// Create a worker whose busy and free thresholds coincide.
    pub fn new(connection_name: impl Into<String>, busy_threshold: usize) -> Self {
        Self {
            connection_name: connection_name.into(),
            busy_threshold: AtomicUsize::new(busy_threshold),
            free_threshold: AtomicUsize::new(busy_threshold),
            is_busy: AtomicBool::new(false),
            in_error: AtomicBool::new(false),
            outstanding: Mutex::new(Vec::new()),
            latency_window: Mutex::new(VecDeque::new()),
            metadata: Mutex::new(serde_json::Value::Null),
        }
    }

    /// Create a worker with distinct busy/free thresholds.
    ///
    /// Fails with [`WorkerError::ThresholdsInconsistent`] unless
    /// `free_threshold <= busy_threshold`.
    pub fn with_thresholds(
        connection_name: impl Into<String>,
        busy_threshold: usize,
        free_threshold: usize,
    ) -> Result<Self, WorkerError> {
        if busy_threshold < free_threshold {
            return Err(WorkerError::ThresholdsInconsistent {
                busy: busy_threshold,
                free: free_threshold,
            });
        }
        let state = Self::new(connection_name, busy_threshold);
        state.free_threshold.store(free_threshold, Ordering::Relaxed);
        Ok(state)
    }

    /// Connection name identifying this worker.
    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// Outstanding count at which the worker becomes busy.
    pub fn busy_threshold(&self) -> usize {
        self.busy_threshold.load(Ordering::Relaxed)
    }

    /// Outstanding count below which the worker becomes free again.
    pub fn free_threshold(&self) -> usize {
        self.free_threshold.load(Ordering::Relaxed)
    }

    /// Whether the worker is at capacity.
    pub fn is_busy(&self) -> bool {
        self.is_busy.load(Ordering::Relaxed)
    }

    /// Whether the worker is quarantined after exhausted send retries.
    pub fn is_in_error(&self) -> bool {
        self.in_error.load(Ordering::Relaxed)
    }

    /// Set or clear the quarantine flag.
    pub fn set_in_error(&self, in_error: bool) {
        self.in_error.store(in_error, Ordering::Relaxed);
    }

    /// Lock-free check used by the selection scan: the worker can accept an
    /// assignment iff it is neither busy nor quarantined.
    pub fn has_slot(&self) -> bool {
        !self.is_busy() && !self.is_in_error()
    }

    /// Construct an assignment of `decision` to this worker.
    ///
    /// Does not insert: the dispatcher sends the decision first and only
    /// commits to the books once the send went through.
    pub fn make_assignment(&self, decision: TriggerDecision) -> Arc<Assignment> {
        Arc::new(Assignment::new(decision, self.connection_name.clone()))
    }

    /// Append an assignment to the outstanding list.
    ///
    /// Fails with [`WorkerError::NoSlotsAvailable`] if the worker was
    /// quarantined between selection and commit. Raises the busy flag once
    /// the outstanding count reaches the busy threshold.
    pub fn add_assignment(&self, assignment: Arc<Assignment>) -> Result<(), WorkerError> {
        let mut outstanding = self.outstanding.lock().unwrap();

        if self.is_in_error() {
            return Err(WorkerError::NoSlotsAvailable {
                connection: self.connection_name.clone(),
                trigger_number: assignment.trigger_number(),
            });
        }

        outstanding.push(assignment);
        debug!(
            worker = %self.connection_name,
            outstanding = outstanding.len(),
            "assignment recorded"
        );

        if outstanding.len() >= self.busy_threshold.load(Ordering::Relaxed) {
            self.is_busy.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Remove and return the assignment for `trigger_number`, if present.
    ///
    /// When a removal drops the outstanding count strictly below the free
    /// threshold, the busy flag clears.
    pub fn extract_assignment(&self, trigger_number: TriggerNumber) -> Option<Arc<Assignment>> {
        let mut outstanding = self.outstanding.lock().unwrap();
        let index = outstanding
            .iter()
            .position(|a| a.trigger_number() == trigger_number)?;
        let assignment = outstanding.remove(index);

        if outstanding.len() < self.free_threshold.load(Ordering::Relaxed) {
            self.is_busy.store(false, Ordering::Relaxed);
        }
        Some(assignment)
    }

    /// Look up an outstanding assignment without removing it.
    pub fn get_assignment(&self, trigger_number: TriggerNumber) -> Option<Arc<Assignment>> {
        self.outstanding
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.trigger_number() == trigger_number)
            .cloned()
    }

    /// Complete the assignment for `trigger_number`.
    ///
    /// Removes it from the books, records the completion latency in the
    /// window, runs the optional metadata updater, and returns the elapsed
    /// time since assignment. Fails with
    /// [`WorkerError::AssignmentNotFound`] when nothing matches.
    pub fn complete_assignment(
        &self,
        trigger_number: TriggerNumber,
        metadata_fn: Option<&MetadataCallback>,
    ) -> Result<Duration, WorkerError> {
        let assignment = self.extract_assignment(trigger_number).ok_or_else(|| {
            WorkerError::AssignmentNotFound {
                connection: self.connection_name.clone(),
                trigger_number,
            }
        })?;

        let now = Instant::now();
        let elapsed = now.duration_since(assignment.assigned_at);
        {
            let mut window = self.latency_window.lock().unwrap();
            window.push_back((now, elapsed));
            if window.len() > LATENCY_WINDOW_CAPACITY {
                window.pop_front();
            }
        }

        if let Some(metadata_fn) = metadata_fn {
            metadata_fn(&mut self.metadata.lock().unwrap());
        }

        Ok(elapsed)
    }

    /// Mean completion latency over window entries recorded at or after
    /// `since`. Returns zero when no entry qualifies.
    pub fn average_latency(&self, since: Instant) -> Duration {
        let window = self.latency_window.lock().unwrap();
        let mut sum = Duration::ZERO;
        let mut count = 0u32;
        for (recorded_at, latency) in window.iter().rev() {
            if *recorded_at < since {
                break;
            }
            sum += *latency;
            count += 1;
        }
        if count == 0 {
            Duration::ZERO
        } else {
            sum / count
        }
    }

    /// Number of assignments currently outstanding.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.lock().unwrap().len()
    }

    /// Snapshot of the worker's metadata blob.
    pub fn metadata(&self) -> serde_json::Value {
        self.metadata.lock().unwrap().clone()
    }
}
