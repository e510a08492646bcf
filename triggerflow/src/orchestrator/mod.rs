//! Lifecycle facade for the data flow orchestrator.
//!
//! The host framework drives the orchestrator through four commands:
//!
//! ```text
//! INIT --configure--> CONFIGURED --start--> RUNNING
//! RUNNING --stop--> CONFIGURED --scrap--> INIT
//! ```
//!
//! `configure` freezes the worker topology and opens the token listener;
//! `start` registers the token callback and launches the dispatch thread
//! for a given run number; `stop` tears them down in the reverse order
//! (callback first, so no token can arrive once the dispatcher is gone);
//! `scrap` releases the listener and the table. Lifecycle commands are
//! serialized by the host; everything else in this crate is thread-safe.

mod error;

pub use error::OrchestratorError;

use crate::config::OrchestratorConfig;
use crate::dispatch::{DispatchContext, Dispatcher, SlotSignal, TokenHandler};
use crate::messages::RunNumber;
use crate::metrics::{MetricsCounters, MetricsSnapshot};
use crate::network::NetworkManager;
use crate::queue::DecisionQueue;
use crate::worker::{MetadataCallback, WorkerState, WorkerTable};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle state of the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No worker topology; only `configure` is accepted.
    Init,
    /// Topology frozen and token listener open; ready to start a run.
    Configured,
    /// Dispatch thread live, tokens flowing.
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => write!(f, "INIT"),
            RunState::Configured => write!(f, "CONFIGURED"),
            RunState::Running => write!(f, "RUNNING"),
        }
    }
}

/// The data flow orchestrator.
///
/// Owns the worker table, the dispatch thread, and the token callback
/// registration; talks to the world through the [`NetworkManager`] it is
/// constructed with and the shared [`DecisionQueue`] the trigger source
/// feeds.
pub struct DataFlowOrchestrator {
    network: Arc<dyn NetworkManager>,
    queue: Arc<DecisionQueue>,
    metrics: Arc<MetricsCounters>,
    slot_signal: Arc<SlotSignal>,
    state: RunState,
    config: Option<OrchestratorConfig>,
    table: Option<Arc<WorkerTable>>,
    dispatcher: Option<Dispatcher>,
    run_number: RunNumber,
    metadata_callback: Option<Arc<MetadataCallback>>,
}

impl DataFlowOrchestrator {
    /// Create an unconfigured orchestrator.
    pub fn new(network: Arc<dyn NetworkManager>, queue: Arc<DecisionQueue>) -> Self {
        Self {
            network,
            queue,
            metrics: Arc::new(MetricsCounters::new()),
            slot_signal: Arc::new(SlotSignal::new()),
            state: RunState::Init,
            config: None,
            table: None,
            dispatcher: None,
            run_number: 0,
            metadata_callback: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run number captured at the last `start`.
    pub fn run_number(&self) -> RunNumber {
        self.run_number
    }

    /// The frozen worker table, once configured.
    pub fn table(&self) -> Option<&Arc<WorkerTable>> {
        self.table.as_ref()
    }

    /// Install the per-completion metadata updater.
    ///
    /// Takes effect at the next `start`.
    pub fn set_metadata_callback(&mut self, callback: Arc<MetadataCallback>) {
        self.metadata_callback = Some(callback);
    }

    /// Drain the operational counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Mean completion latency of one worker since `since`.
    pub fn average_latency(
        &self,
        connection: &str,
        since: Instant,
    ) -> Result<Duration, OrchestratorError> {
        let table = self
            .table
            .as_ref()
            .ok_or(OrchestratorError::InvalidTransition {
                state: self.state,
                command: "average_latency",
            })?;
        let worker = table
            .get(connection)
            .ok_or_else(|| OrchestratorError::UnknownWorker(connection.to_string()))?;
        Ok(worker.average_latency(since))
    }

    /// Freeze the worker topology and open the token listener.
    ///
    /// Accepted in INIT and CONFIGURED (reconfiguration replaces the
    /// previous topology and listener).
    pub fn configure(&mut self, config: OrchestratorConfig) -> Result<(), OrchestratorError> {
        if self.state == RunState::Running {
            return Err(OrchestratorError::InvalidTransition {
                state: self.state,
                command: "configure",
            });
        }
        config.validate()?;

        if let Some(previous) = self.config.take() {
            if let Err(stop_error) = self.network.stop_listening(&previous.token_connection) {
                debug!(error = %stop_error, "previous token listener already gone");
            }
        }

        let workers: Vec<WorkerState> = config
            .dataflow_applications
            .iter()
            .map(|app| WorkerState::new(app.decision_connection.clone(), app.capacity))
            .collect();

        self.network.start_listening(&config.token_connection)?;
        self.table = Some(Arc::new(WorkerTable::new(workers)));
        info!(
            workers = config.dataflow_applications.len(),
            token_connection = %config.token_connection,
            "configured"
        );
        self.config = Some(config);
        self.state = RunState::Configured;
        Ok(())
    }

    /// Begin a run: register the token callback and launch the dispatcher.
    pub fn start(&mut self, run_number: RunNumber) -> Result<(), OrchestratorError> {
        if self.state != RunState::Configured {
            return Err(OrchestratorError::InvalidTransition {
                state: self.state,
                command: "start",
            });
        }
        let (Some(config), Some(table)) = (&self.config, &self.table) else {
            return Err(OrchestratorError::InvalidTransition {
                state: self.state,
                command: "start",
            });
        };

        self.metrics.reset();
        self.run_number = run_number;

        let handler = Arc::new(TokenHandler::new(
            Arc::clone(table),
            run_number,
            Arc::clone(&self.metrics),
            Arc::clone(&self.slot_signal),
            self.metadata_callback.clone(),
        ));
        let callback_handler = Arc::clone(&handler);
        self.network.register_callback(
            &config.token_connection,
            Arc::new(move |bytes: &[u8]| callback_handler.handle(bytes)),
        )?;

        self.dispatcher = Some(Dispatcher::start(DispatchContext {
            table: Arc::clone(table),
            queue: Arc::clone(&self.queue),
            network: Arc::clone(&self.network),
            metrics: Arc::clone(&self.metrics),
            slot_signal: Arc::clone(&self.slot_signal),
            queue_timeout: config.general_queue_timeout,
            send_retries: config.td_send_retries,
        }));

        self.state = RunState::Running;
        info!(run_number, "started");
        Ok(())
    }

    /// End the run: deregister the token callback, then stop and join the
    /// dispatcher (which drains the input queue best-effort).
    ///
    /// A second `stop` after the first is a no-op.
    pub fn stop(&mut self) -> Result<(), OrchestratorError> {
        match self.state {
            RunState::Running => {}
            RunState::Configured => return Ok(()),
            RunState::Init => {
                return Err(OrchestratorError::InvalidTransition {
                    state: self.state,
                    command: "stop",
                });
            }
        }

        // Callback first: once it is cleared no new token can reach the
        // table, and any invocation already in flight finishes against
        // state that is still alive.
        if let Some(config) = &self.config {
            if let Err(clear_error) = self.network.clear_callback(&config.token_connection) {
                warn!(error = %clear_error, "could not clear token callback");
            }
        }

        if let Some(mut dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
            dispatcher.join();
        }

        self.state = RunState::Configured;
        info!("successfully stopped");
        Ok(())
    }

    /// Release the token listener and drop the worker topology.
    pub fn scrap(&mut self) -> Result<(), OrchestratorError> {
        if self.state != RunState::Configured {
            return Err(OrchestratorError::InvalidTransition {
                state: self.state,
                command: "scrap",
            });
        }

        if let Some(config) = self.config.take() {
            if let Err(stop_error) = self.network.stop_listening(&config.token_connection) {
                warn!(error = %stop_error, "could not stop token listener");
            }
        }
        self.table = None;
        self.state = RunState::Init;
        info!("successfully scrapped");
        Ok(())
    }
}

impl Drop for DataFlowOrchestrator {
    fn drop(&mut self) {
        if self.state == RunState::Running {
            let _ = self.stop();
        }
    }
}
