//! Global configuration model for the infrad agent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{InfradError, Result};

/// Root configuration for the infrad agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Liveness gateway settings.
    pub health: HealthConfig,
}

impl AgentConfig {
    /// Loads the configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| InfradError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every section holds usable values.
    ///
    /// # Errors
    ///
    /// Returns [`InfradError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.health.validate()
    }
}

/// Settings of the liveness gateway and its downstream probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Address to bind the HTTP listener to.
    pub listen_address: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// `host:port` of the infra manager gRPC health service.
    pub infra_manager: String,
    /// `host:port` of the infra agent gRPC health service.
    pub infra_agent: String,
    /// Upper bound for each downstream probe.
    pub probe_timeout_ms: u64,
    /// Time in-flight requests get to finish once shutdown starts.
    pub shutdown_grace_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            listen_address: constants::DEFAULT_HEALTH_LISTEN_ADDRESS.into(),
            port: constants::DEFAULT_HEALTH_SERVER_PORT,
            infra_manager: constants::DEFAULT_INFRA_MANAGER_TARGET.into(),
            infra_agent: constants::DEFAULT_INFRA_AGENT_TARGET.into(),
            probe_timeout_ms: constants::DEFAULT_PROBE_TIMEOUT_MS,
            shutdown_grace_secs: constants::DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl HealthConfig {
    /// Returns the `address:port` string to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(InfradError::Config {
                message: format!("health.{message}"),
            })
        };
        if self.listen_address.is_empty() {
            return invalid("listen_address must not be empty");
        }
        if self.port == 0 {
            return invalid("port must be non-zero");
        }
        if !is_host_port(&self.infra_manager) {
            return invalid("infra_manager must be host:port");
        }
        if !is_host_port(&self.infra_agent) {
            return invalid("infra_agent must be host:port");
        }
        if self.probe_timeout_ms == 0 {
            return invalid("probe_timeout_ms must be non-zero");
        }
        Ok(())
    }
}

fn is_host_port(target: &str) -> bool {
    target
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0))
}
