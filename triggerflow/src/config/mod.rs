//! Orchestrator configuration.
//!
//! Configuration arrives either programmatically (the host framework hands
//! over an [`OrchestratorConfig`]) or from an INI file (the CLI). The split
//! mirrors the rest of the config handling in this workspace: pure data
//! structs in [`settings`], INI key mapping in the parser, defaults in one
//! place.
//!
//! ```ini
//! [orchestrator]
//! queue_timeout_ms = 100
//! token_connection = toward_dfo
//! send_retries = 3
//!
//! [workers]
//! trb01 = 5
//! trb02 = 5
//! ```

mod defaults;
mod parser;
mod settings;

pub use defaults::{DEFAULT_QUEUE_TIMEOUT_MS, DEFAULT_SEND_RETRIES};
pub use settings::{OrchestratorConfig, TrbConnection};

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("could not read config file {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid INI.
    #[error("could not parse config file: {0}")]
    Parse(String),

    /// A key is present but its value is unusable.
    #[error("invalid value for [{section}] {key} = \"{value}\": {reason}")]
    InvalidValue {
        /// INI section.
        section: String,
        /// Key within the section.
        key: String,
        /// Offending value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The assembled configuration violates a constraint.
    #[error("configuration invalid: {0}")]
    Invalid(String),
}
