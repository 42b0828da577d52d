//! Downstream health probes.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;

use crate::error::HealthError;

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The target answered `SERVING`.
    Serving,
    /// The target answered, but not `SERVING`.
    NotServing,
    /// The target could not be asked: unreachable, timed out or the RPC failed.
    Unknown,
}

impl ProbeStatus {
    /// Only `Serving` counts as healthy.
    #[must_use]
    pub const fn is_serving(self) -> bool {
        matches!(self, Self::Serving)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serving => write!(f, "serving"),
            Self::NotServing => write!(f, "not-serving"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Something the gateway can ask "are you healthy?".
///
/// Implementations never return errors: failures are reported as
/// [`ProbeStatus::Unknown`] and logged.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Short name used in logs and responses.
    fn name(&self) -> &str;

    /// Performs one check, bounded in time.
    async fn probe(&self) -> ProbeStatus;
}

/// Probes a standard `grpc.health.v1.Health` service for overall server
/// health (empty service name).
#[derive(Debug, Clone)]
pub struct GrpcHealthProbe {
    name: String,
    target: String,
    timeout: Duration,
}

impl GrpcHealthProbe {
    /// Creates a probe for `target` (`host:port`, plaintext).
    pub fn new(name: impl Into<String>, target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            timeout,
        }
    }

    /// Probed `host:port`.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Connects and issues one `Check`, without the overall time bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is malformed, unreachable or the RPC fails.
    pub async fn check(&self) -> Result<ServingStatus, HealthError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", self.target))
            .map_err(|source| HealthError::InvalidTarget {
                target: self.target.clone(),
                source,
            })?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|source| HealthError::Connect {
                target: self.target.clone(),
                source,
            })?;

        let response = HealthClient::new(channel)
            .check(HealthCheckRequest {
                service: String::new(),
            })
            .await
            .map_err(|source| HealthError::Rpc {
                target: self.target.clone(),
                source,
            })?;

        Ok(response.into_inner().status())
    }
}

#[async_trait]
impl HealthProbe for GrpcHealthProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> ProbeStatus {
        let outcome = match tokio::time::timeout(self.timeout, self.check()).await {
            Ok(result) => result,
            Err(_) => Err(HealthError::Timeout {
                target: self.target.clone(),
                after: self.timeout,
            }),
        };

        match outcome {
            Ok(ServingStatus::Serving) => ProbeStatus::Serving,
            Ok(status) => {
                tracing::warn!(
                    probe = %self.name,
                    target = %self.target,
                    status = status.as_str_name(),
                    "downstream health service is not serving"
                );
                ProbeStatus::NotServing
            }
            Err(e) => {
                tracing::warn!(
                    probe = %self.name,
                    target = %self.target,
                    error = %e,
                    "downstream health check failed"
                );
                ProbeStatus::Unknown
            }
        }
    }
}
