//! Settings structs for the orchestrator.
//!
//! Pure data types with validation; no parsing logic here.

use super::defaults::{DEFAULT_QUEUE_TIMEOUT_MS, DEFAULT_SEND_RETRIES};
use super::{parser, ConfigError};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// One downstream TRB worker to manage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrbConnection {
    /// Connection name decisions are sent to; identifies the worker.
    pub decision_connection: String,
    /// Outstanding-assignment capacity (busy threshold).
    pub capacity: usize,
}

/// Complete orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Workers to manage, in selection order.
    pub dataflow_applications: Vec<TrbConnection>,
    /// Timeout applied to queue pops and network sends.
    pub general_queue_timeout: Duration,
    /// Connection to listen on for completion tokens.
    pub token_connection: String,
    /// Send attempts per decision per worker.
    pub td_send_retries: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dataflow_applications: Vec::new(),
            general_queue_timeout: Duration::from_millis(DEFAULT_QUEUE_TIMEOUT_MS),
            token_connection: String::new(),
            td_send_retries: DEFAULT_SEND_RETRIES,
        }
    }
}

impl OrchestratorConfig {
    /// Load and validate a configuration from an INI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = parser::parse_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints a usable configuration must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataflow_applications.is_empty() {
            return Err(ConfigError::Invalid("no workers defined".to_string()));
        }
        if self.token_connection.is_empty() {
            return Err(ConfigError::Invalid(
                "token_connection must be set".to_string(),
            ));
        }
        if self.td_send_retries == 0 {
            return Err(ConfigError::Invalid(
                "send_retries must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for app in &self.dataflow_applications {
            if app.capacity == 0 {
                return Err(ConfigError::Invalid(format!(
                    "worker \"{}\" has zero capacity",
                    app.decision_connection
                )));
            }
            if !seen.insert(app.decision_connection.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate worker connection \"{}\"",
                    app.decision_connection
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> OrchestratorConfig {
        OrchestratorConfig {
            dataflow_applications: vec![TrbConnection {
                decision_connection: "trb01".to_string(),
                capacity: 5,
            }],
            token_connection: "toward_dfo".to_string(),
            ..OrchestratorConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_workers_rejected() {
        let mut config = valid();
        config.dataflow_applications.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_token_connection_rejected() {
        let mut config = valid();
        config.token_connection.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = valid();
        config.td_send_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = valid();
        config.dataflow_applications[0].capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let mut config = valid();
        let dup = config.dataflow_applications[0].clone();
        config.dataflow_applications.push(dup);
        assert!(config.validate().is_err());
    }
}
