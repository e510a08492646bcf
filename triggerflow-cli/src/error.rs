//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use triggerflow::config::ConfigError;
use triggerflow::network::NetworkError;
use triggerflow::orchestrator::OrchestratorError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigError),
    /// Orchestrator lifecycle command failed
    Orchestrator(OrchestratorError),
    /// Simulation network setup failed
    Network(NetworkError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(_) = self {
            eprintln!();
            eprintln!("A minimal configuration file looks like:");
            eprintln!();
            eprintln!("  [orchestrator]");
            eprintln!("  token_connection = toward_dfo");
            eprintln!();
            eprintln!("  [workers]");
            eprintln!("  trb01 = 5");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Orchestrator(e) => write!(f, "Orchestrator error: {}", e),
            CliError::Network(e) => write!(f, "Network setup error: {}", e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        CliError::Config(error)
    }
}

impl From<OrchestratorError> for CliError {
    fn from(error: OrchestratorError) -> Self {
        CliError::Orchestrator(error)
    }
}

impl From<NetworkError> for CliError {
    fn from(error: NetworkError) -> Self {
        CliError::Network(error)
    }
}
