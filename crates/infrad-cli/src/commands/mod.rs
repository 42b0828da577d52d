//! CLI command definitions and dispatch.

pub mod health;
pub mod link;

use clap::{Parser, Subcommand, ValueEnum};
use infrad_common::constants::BIN_NAME;

/// infrad: infra agent, liveness gateway and interface namespace migration.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// How log events are rendered on stderr.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the liveness gateway.
    Health(health::HealthArgs),
    /// Move and configure network interfaces.
    Link(link::LinkArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Health(args) => health::execute(args),
        Command::Link(args) => link::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn binary_name_is_infrad() {
        assert_eq!(Cli::command().get_name(), BIN_NAME);
    }

    #[test]
    fn log_format_is_global() {
        let cli = Cli::try_parse_from(["infrad", "health", "serve", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
