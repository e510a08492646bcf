//! INI parsing for the orchestrator configuration.
//!
//! Single place where INI key names are mapped to struct fields. Starts
//! from [`OrchestratorConfig::default`] and overlays any values found in
//! the file.

use super::settings::{OrchestratorConfig, TrbConnection};
use super::ConfigError;
use ini::Ini;
use std::path::Path;
use std::time::Duration;

pub(super) fn parse_file(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let ini = Ini::load_from_file(path).map_err(|load_error| match load_error {
        ini::Error::Io(source) => ConfigError::Io {
            path: path.display().to_string(),
            source,
        },
        ini::Error::Parse(parse) => ConfigError::Parse(parse.to_string()),
    })?;
    parse_ini(&ini)
}

fn parse_ini(ini: &Ini) -> Result<OrchestratorConfig, ConfigError> {
    let mut config = OrchestratorConfig::default();

    if let Some(section) = ini.section(Some("orchestrator")) {
        if let Some(v) = section.get("queue_timeout_ms") {
            let millis: u64 = v.parse().map_err(|_| ConfigError::InvalidValue {
                section: "orchestrator".to_string(),
                key: "queue_timeout_ms".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer (milliseconds)".to_string(),
            })?;
            config.general_queue_timeout = Duration::from_millis(millis);
        }
        if let Some(v) = section.get("token_connection") {
            let v = v.trim();
            if !v.is_empty() {
                config.token_connection = v.to_string();
            }
        }
        if let Some(v) = section.get("send_retries") {
            config.td_send_retries = v.parse().map_err(|_| ConfigError::InvalidValue {
                section: "orchestrator".to_string(),
                key: "send_retries".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
        }
    }

    if let Some(section) = ini.section(Some("workers")) {
        for (connection, value) in section.iter() {
            let capacity: usize = value.parse().map_err(|_| ConfigError::InvalidValue {
                section: "workers".to_string(),
                key: connection.to_string(),
                value: value.to_string(),
                reason: "must be a positive integer (slot capacity)".to_string(),
            })?;
            config.dataflow_applications.push(TrbConnection {
                decision_connection: connection.to_string(),
                capacity,
            });
        }
    }

    Ok(config)
}
