//! `infrad health serve`: Run the liveness gateway until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};
use infrad_common::config::{AgentConfig, HealthConfig};
use infrad_common::types::ServerStatus;
use infrad_health::server::{GatewayState, HealthServer};
use infrad_health::status::StatusFlag;

/// Arguments for the `health` command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Health subcommand.
    #[command(subcommand)]
    pub command: HealthCommand,
}

/// Health subcommands.
#[derive(Subcommand, Debug)]
pub enum HealthCommand {
    /// Serve `GET /check` until interrupted.
    Serve(ServeArgs),
}

/// Arguments for `health serve`. Flags override the config file.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    pub listen: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// `host:port` of the infra manager gRPC health service.
    #[arg(long)]
    pub infra_manager: Option<String>,

    /// `host:port` of the infra agent gRPC health service.
    #[arg(long)]
    pub infra_agent: Option<String>,
}

impl ServeArgs {
    /// Loads the config file, if any, applies flag overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn resolve(self) -> anyhow::Result<HealthConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => AgentConfig::default(),
        };

        let health = &mut config.health;
        if let Some(listen) = self.listen {
            health.listen_address = listen;
        }
        if let Some(port) = self.port {
            health.port = port;
        }
        if let Some(target) = self.infra_manager {
            health.infra_manager = target;
        }
        if let Some(target) = self.infra_agent {
            health.infra_agent = target;
        }

        config.validate().context("invalid health configuration")?;
        Ok(config.health)
    }
}

/// Executes the `health` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server fails.
pub fn execute(args: HealthArgs) -> anyhow::Result<()> {
    match args.command {
        HealthCommand::Serve(args) => serve(args),
    }
}

fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run_gateway(config))
}

async fn run_gateway(config: HealthConfig) -> anyhow::Result<()> {
    let status = StatusFlag::new();
    let state = GatewayState::from_config(&config, Arc::new(status.clone()));
    let server = HealthServer::bind(&config, state).await?;
    status.set(ServerStatus::Ok);

    tracing::info!(
        infra_manager = %config.infra_manager,
        infra_agent = %config.infra_agent,
        "press Ctrl+C to stop"
    );

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C, shutting down");
        }
        status.set(ServerStatus::Stopped);
    };

    server.serve(shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let config = ServeArgs::default().resolve().unwrap();
        assert_eq!(config, HealthConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "health": {{ "port": 9100, "infra_agent": "10.0.0.2:50001" }} }}"#
        )
        .unwrap();

        let config = ServeArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(9200),
            infra_manager: Some("10.0.0.1:50002".into()),
            ..ServeArgs::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(config.port, 9200);
        assert_eq!(config.infra_manager, "10.0.0.1:50002");
        assert_eq!(config.infra_agent, "10.0.0.2:50001");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = ServeArgs {
            port: Some(0),
            ..ServeArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
