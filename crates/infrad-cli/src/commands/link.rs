//! `infrad link move`: Move an interface into a network namespace and configure it.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use infrad_common::types::{Cidr, MigrationRequest, RouteSpec, netns_path};
use infrad_core::link::NetlinkBackend;
use infrad_core::migrate::Migrator;

use crate::output;

/// Arguments for the `link` command.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Link subcommand.
    #[command(subcommand)]
    pub command: LinkCommand,
}

/// Link subcommands.
#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    /// Move a host interface into a network namespace, then rename,
    /// address, activate and route it there.
    Move(MoveArgs),
}

/// Arguments for `link move`: either a request file or individual flags.
#[derive(Args, Debug, Default)]
pub struct MoveArgs {
    /// JSON migration request file.
    #[arg(
        long,
        conflicts_with_all = ["netns", "ifname", "name", "mtu", "addresses", "routes"]
    )]
    pub request: Option<PathBuf>,

    /// Target namespace: a path, or a name under /var/run/netns.
    #[arg(long, required_unless_present = "request")]
    pub netns: Option<String>,

    /// Interface to move, as named in the host namespace.
    #[arg(long, required_unless_present = "request")]
    pub ifname: Option<String>,

    /// Name inside the target namespace. Defaults to the current name.
    #[arg(long)]
    pub name: Option<String>,

    /// MTU to set before the move. 0 leaves it unchanged.
    #[arg(long)]
    pub mtu: Option<u32>,

    /// Address to assign, as CIDR. Repeatable; applied in order.
    #[arg(long = "address", value_name = "CIDR")]
    pub addresses: Vec<Cidr>,

    /// Route to install: `DEST[,via=GATEWAY][,dev=DEVICE]`. Repeatable; installed in order.
    #[arg(long = "route", value_name = "SPEC")]
    pub routes: Vec<RouteSpec>,
}

impl MoveArgs {
    /// Builds the migration request from the file or the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the request file cannot be read or parsed, or a
    /// required flag is missing.
    pub fn into_request(self) -> anyhow::Result<MigrationRequest> {
        if let Some(path) = self.request {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read request {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse request {}", path.display()));
        }

        let netns = self.netns.context("--netns is required without --request")?;
        let ifname = self.ifname.context("--ifname is required without --request")?;
        let mut request = MigrationRequest::new(netns_path(&netns), ifname);
        if let Some(name) = self.name {
            request.desired_interface_name = name;
        }
        request.mtu = self.mtu;
        request.addresses = self.addresses;
        request.routes = self.routes;
        Ok(request)
    }
}

/// Executes the `link` command.
///
/// # Errors
///
/// Returns an error if the request is invalid or any migration step fails.
pub fn execute(args: LinkArgs) -> anyhow::Result<()> {
    match args.command {
        LinkCommand::Move(args) => move_link(args),
    }
}

fn move_link(args: MoveArgs) -> anyhow::Result<()> {
    let request = args.into_request()?;
    let migrator = Migrator::new(NetlinkBackend::new()?);

    match migrator.migrate(&request) {
        Ok(()) => {
            output::print_migration_done(&request);
            Ok(())
        }
        Err(e) => {
            output::print_migration_failed(&request, &e);
            Err(e).with_context(|| {
                format!(
                    "failed to move {} into {}",
                    request.source_interface_name,
                    request.target_namespace.display()
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn parse(args: &[&str]) -> MoveArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Link(LinkArgs {
                command: LinkCommand::Move(args),
            }) => args,
            Command::Health(_) => panic!("expected link move"),
        }
    }

    #[test]
    fn flags_build_a_request() {
        let request = parse(&[
            "infrad", "link", "move", "--netns", "ns1", "--ifname", "eth0", "--name", "net1",
            "--mtu", "1500", "--address", "10.0.0.5/24", "--route", "0.0.0.0/0,via=10.0.0.1",
        ])
        .into_request()
        .unwrap();

        assert_eq!(request.target_namespace, Path::new("/var/run/netns/ns1"));
        assert_eq!(request.source_interface_name, "eth0");
        assert_eq!(request.desired_interface_name, "net1");
        assert_eq!(request.effective_mtu(), Some(1500));
        assert_eq!(request.addresses, vec!["10.0.0.5/24".parse::<Cidr>().unwrap()]);
        assert_eq!(request.routes.len(), 1);
        assert_eq!(request.routes[0].gateway, Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn name_defaults_to_source() {
        let request = parse(&["infrad", "link", "move", "--netns", "/proc/42/ns/net", "--ifname", "eth1"])
            .into_request()
            .unwrap();
        assert_eq!(request.target_namespace, Path::new("/proc/42/ns/net"));
        assert_eq!(request.desired_interface_name, "eth1");
        assert!(request.addresses.is_empty());
    }

    #[test]
    fn request_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "targetNamespace": "/var/run/netns/ns1", "sourceInterfaceName": "eth0",
                 "desiredInterfaceName": "net1", "addresses": ["fd00::5/64"] }}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let request = parse(&["infrad", "link", "move", "--request", path])
            .into_request()
            .unwrap();
        assert_eq!(request.desired_interface_name, "net1");
        assert_eq!(request.addresses.len(), 1);
        assert!(request.routes.is_empty());
    }

    #[test]
    fn request_conflicts_with_flags() {
        assert!(
            Cli::try_parse_from(["infrad", "link", "move", "--request", "r.json", "--ifname", "eth0"])
                .is_err()
        );
    }

    #[test]
    fn flags_are_required_without_request() {
        assert!(Cli::try_parse_from(["infrad", "link", "move", "--netns", "ns1"]).is_err());
    }

    #[test]
    fn malformed_address_is_rejected_at_parse_time() {
        assert!(
            Cli::try_parse_from([
                "infrad", "link", "move", "--netns", "ns1", "--ifname", "eth0", "--address",
                "10.0.0.5",
            ])
            .is_err()
        );
    }
}
