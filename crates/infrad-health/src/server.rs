//! HTTP liveness gateway.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use infrad_common::config::HealthConfig;
use infrad_common::constants::HEALTH_CHECK_PATH;
use infrad_common::types::ServerStatus;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::HealthError;
use crate::probe::{GrpcHealthProbe, HealthProbe, ProbeStatus};
use crate::status::StatusProvider;

/// Alias for [`HEALTH_CHECK_PATH`], for orchestrators that expect the usual name.
pub const HEALTHZ_PATH: &str = "/healthz";

/// The check that failed an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedCheck {
    /// A downstream probe did not report `SERVING`.
    Probe {
        /// Probe name.
        name: String,
        /// What it reported instead.
        status: ProbeStatus,
    },
    /// The local status provider did not report OK.
    LocalStatus(ServerStatus),
}

impl fmt::Display for FailedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe { name, status } => write!(f, "{name} is {status}"),
            Self::LocalStatus(status) => write!(f, "server status is {status}"),
        }
    }
}

/// Everything a `/check` request consults.
///
/// Checks run in a fixed order: infra manager, infra agent, local status.
#[derive(Clone)]
pub struct GatewayState {
    infra_manager: Arc<dyn HealthProbe>,
    infra_agent: Arc<dyn HealthProbe>,
    status: Arc<dyn StatusProvider>,
}

impl GatewayState {
    /// Builds a state from explicit probes and status source.
    pub fn new(
        infra_manager: Arc<dyn HealthProbe>,
        infra_agent: Arc<dyn HealthProbe>,
        status: Arc<dyn StatusProvider>,
    ) -> Self {
        Self {
            infra_manager,
            infra_agent,
            status,
        }
    }

    /// Builds gRPC probes for the targets named in `config`.
    pub fn from_config(config: &HealthConfig, status: Arc<dyn StatusProvider>) -> Self {
        let timeout = Duration::from_millis(config.probe_timeout_ms);
        Self::new(
            Arc::new(GrpcHealthProbe::new(
                "infra-manager",
                config.infra_manager.clone(),
                timeout,
            )),
            Arc::new(GrpcHealthProbe::new(
                "infra-agent",
                config.infra_agent.clone(),
                timeout,
            )),
            status,
        )
    }

    /// Runs the checks in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first check that did not pass.
    pub async fn evaluate(&self) -> Result<(), FailedCheck> {
        for probe in [&self.infra_manager, &self.infra_agent] {
            let status = probe.probe().await;
            if !status.is_serving() {
                return Err(FailedCheck::Probe {
                    name: probe.name().to_owned(),
                    status,
                });
            }
        }

        match self.status.status() {
            ServerStatus::Ok => Ok(()),
            other => Err(FailedCheck::LocalStatus(other)),
        }
    }
}

impl fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayState")
            .field("infra_manager", &self.infra_manager.name())
            .field("infra_agent", &self.infra_agent.name())
            .field("status", &self.status.status())
            .finish()
    }
}

/// `/check`: 200 when every check passes, 500 naming the first that did not.
pub async fn check_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    match state.evaluate().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(failed) => {
            warn!(
                event.name = "health.check_failed",
                check = %failed,
                "liveness check failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "fail", "reason": failed.to_string() })),
            )
        }
    }
}

/// Builds the gateway router. `get` routes also answer `HEAD`.
pub fn create_health_router(state: GatewayState) -> Router {
    Router::new()
        .route(HEALTH_CHECK_PATH, get(check_handler))
        .route(HEALTHZ_PATH, get(check_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A bound, not yet serving, gateway.
#[derive(Debug)]
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
    grace: Duration,
}

impl HealthServer {
    /// Binds the listener named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::BindAddress`] if the address cannot be bound.
    pub async fn bind(config: &HealthConfig, state: GatewayState) -> Result<Self, HealthError> {
        let bind_address = config.bind_address();
        let listener = TcpListener::bind(&bind_address)
            .await
            .map_err(|e| HealthError::bind_address(&bind_address, e))?;

        Ok(Self {
            listener,
            router: create_health_router(state),
            grace: Duration::from_secs(config.shutdown_grace_secs),
        })
    }

    /// Address actually bound, useful when the configured port is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, HealthError> {
        self.listener
            .local_addr()
            .map_err(|e| HealthError::bind_address("local address", e))
    }

    /// Serves until `shutdown` resolves, then stops accepting and lets
    /// in-flight requests finish for at most the grace period.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::ServeError`] if the server fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), HealthError>
    where
        F: Future<Output = ()>,
    {
        let bind_address = self.local_addr()?;
        let grace = self.grace;
        let stop = Arc::new(Notify::new());
        let stopping = {
            let stop = Arc::clone(&stop);
            async move { stop.notified().await }
        };

        info!(
            event.name = "health.started",
            net.listen.address = %bind_address,
            "health server has started"
        );

        let server = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(stopping)
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => result.map_err(HealthError::ServeError),
            () = shutdown => {
                info!(
                    event.name = "health.stopping",
                    grace_secs = grace.as_secs(),
                    "draining in-flight health requests"
                );
                stop.notify_one();
                if let Ok(result) = tokio::time::timeout(grace, &mut server).await {
                    result.map_err(HealthError::ServeError)?;
                } else {
                    warn!(
                        event.name = "health.grace_expired",
                        "in-flight health requests did not finish within the grace period"
                    );
                }
                info!(event.name = "health.stopped", "health server has stopped");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_check_display() {
        let probe = FailedCheck::Probe {
            name: "infra-agent".into(),
            status: ProbeStatus::Unknown,
        };
        assert_eq!(probe.to_string(), "infra-agent is unknown");
        assert_eq!(
            FailedCheck::LocalStatus(ServerStatus::Stopped).to_string(),
            "server status is stopped"
        );
    }
}
