//! CLI runner for common setup and operations.
//!
//! Encapsulates configuration loading and logging initialization to keep
//! the command handlers small.

use crate::error::CliError;
use std::path::Path;
use tracing::info;
use triggerflow::config::OrchestratorConfig;
use triggerflow::logging::{default_log_dir, default_log_file, init_logging_full, LoggingGuard};

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: OrchestratorConfig,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - INI file to load the orchestrator config from
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: &Path, debug_mode: bool) -> Result<Self, CliError> {
        let config = OrchestratorConfig::load(config_path)?;

        let logging_guard =
            init_logging_full(default_log_dir(), default_log_file(), true, debug_mode)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("TriggerFlow v{}", triggerflow::VERSION);
        info!("TriggerFlow CLI: {} command", command);
        info!(
            workers = self.config.dataflow_applications.len(),
            token_connection = %self.config.token_connection,
            "configuration loaded"
        );
    }
}
