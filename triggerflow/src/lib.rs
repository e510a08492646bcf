//! TriggerFlow - Trigger decision dispatch for data acquisition
//!
//! This library implements a data flow orchestrator: a dispatch scheduler
//! sitting between an upstream trigger source and a pool of downstream
//! trigger record builder (TRB) workers. Decisions are pulled from a bounded
//! input queue, routed round-robin to a worker with spare capacity, and
//! matched against the asynchronous completion tokens the workers send back.
//!
//! # High-Level API
//!
//! The [`orchestrator`] module provides the lifecycle facade:
//!
//! ```ignore
//! use triggerflow::config::OrchestratorConfig;
//! use triggerflow::network::InProcessNetwork;
//! use triggerflow::orchestrator::DataFlowOrchestrator;
//! use triggerflow::queue::DecisionQueue;
//! use std::sync::Arc;
//!
//! let network = Arc::new(InProcessNetwork::new());
//! let queue = Arc::new(DecisionQueue::new(1024));
//!
//! let mut dfo = DataFlowOrchestrator::new(network, queue.clone());
//! dfo.configure(OrchestratorConfig::load("config.ini")?)?;
//! dfo.start(run_number)?;
//! // ... trigger source pushes decisions into `queue` ...
//! dfo.stop()?;
//! dfo.scrap()?;
//! ```

pub mod config;
pub mod dispatch;
pub mod logging;
pub mod messages;
pub mod metrics;
pub mod network;
pub mod orchestrator;
pub mod queue;
pub mod worker;

/// Version of the TriggerFlow library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
