//! Host-facing error type for lifecycle commands.

use super::RunState;
use crate::config::ConfigError;
use crate::network::NetworkError;
use crate::worker::WorkerError;
use thiserror::Error;

/// Errors returned by [`DataFlowOrchestrator`](super::DataFlowOrchestrator)
/// lifecycle commands.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The command is not valid in the current lifecycle state.
    #[error("{command} is not allowed in state {state}")]
    InvalidTransition {
        /// State the orchestrator was in.
        state: RunState,
        /// Rejected command.
        command: &'static str,
    },

    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Worker construction failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The network layer refused an operation.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// A query named a worker that is not in the table.
    #[error("unknown worker \"{0}\"")]
    UnknownWorker(String),
}
