//! Domain primitive types used across the infrad workspace.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_INTERFACE_NAME_LEN, NETNS_RUN_DIR};
use crate::error::{InfradError, Result};

/// An IP address together with its network prefix length, e.g. `10.0.0.5/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    address: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// Creates a CIDR from an address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is longer than the address family allows.
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self> {
        let max = max_prefix_len(address);
        if prefix_len > max {
            return Err(InfradError::parse(
                "CIDR",
                &format!("{address}/{prefix_len}"),
                format!("prefix length exceeds {max}"),
            ));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// Returns the address part.
    #[must_use]
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns whether this is an IPv4 CIDR.
    #[must_use]
    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// Returns whether the prefix covers the whole address space (a default route).
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.prefix_len == 0
    }
}

const fn max_prefix_len(address: IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

impl FromStr for Cidr {
    type Err = InfradError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| InfradError::parse("CIDR", s, "missing '/<prefix>'"))?;
        let address: IpAddr = addr
            .parse()
            .map_err(|e| InfradError::parse("CIDR", s, format!("{e}")))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|e| InfradError::parse("CIDR", s, format!("bad prefix: {e}")))?;
        Self::new(address, prefix_len)
    }
}

impl TryFrom<String> for Cidr {
    type Error = InfradError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// A route to install once the interface is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Destination network. `0.0.0.0/0` or `::/0` for a default route.
    #[serde(alias = "dst", alias = "dest")]
    pub destination: Cidr,
    /// Next hop, if the destination is not directly connected.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "gw")]
    pub gateway: Option<IpAddr>,
    /// Output device. Defaults to the migrated interface.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "dev")]
    pub device: Option<String>,
}

impl RouteSpec {
    /// Creates a directly connected route to `destination`.
    #[must_use]
    pub const fn new(destination: Cidr) -> Self {
        Self {
            destination,
            gateway: None,
            device: None,
        }
    }

    /// Sets the next hop.
    #[must_use]
    pub const fn via(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Sets the output device.
    #[must_use]
    pub fn dev(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Checks the gateway family against the destination family.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway is IPv4 for an IPv6 destination or vice versa,
    /// or if the device name is not a valid interface name.
    pub fn validate(&self) -> Result<()> {
        if let Some(gw) = self.gateway.filter(|gw| gw.is_ipv4() != self.destination.is_ipv4()) {
            return Err(InfradError::InvalidRequest {
                message: format!(
                    "route {}: gateway {gw} is not in the destination's address family",
                    self.destination
                ),
            });
        }
        if let Some(dev) = &self.device {
            validate_interface_name("route device", dev)?;
        }
        Ok(())
    }
}

/// Parses `DEST[,via=GATEWAY][,dev=DEVICE]`.
impl FromStr for RouteSpec {
    type Err = InfradError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',').map(str::trim);
        let dest = parts
            .next()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| InfradError::parse("route", s, "missing destination"))?;
        let mut route = Self::new(dest.parse()?);
        for part in parts {
            match part.split_once('=') {
                Some(("via" | "gw", gw)) => {
                    let gw = gw
                        .parse()
                        .map_err(|e| InfradError::parse("route", s, format!("bad gateway: {e}")))?;
                    route.gateway = Some(gw);
                }
                Some(("dev", dev)) if !dev.is_empty() => route.device = Some(dev.to_owned()),
                _ => return Err(InfradError::parse("route", s, format!("unknown option {part:?}"))),
            }
        }
        route.validate()?;
        Ok(route)
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(gw) = self.gateway {
            write!(f, " via {gw}")?;
        }
        if let Some(dev) = &self.device {
            write!(f, " dev {dev}")?;
        }
        Ok(())
    }
}

/// A validated request to move one interface into a workload's network namespace.
///
/// Consumed exactly once by the migrator; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    /// Path to the target network namespace file.
    pub target_namespace: PathBuf,
    /// Interface name in the host namespace.
    pub source_interface_name: String,
    /// Interface name inside the target namespace.
    pub desired_interface_name: String,
    /// MTU to apply before the move. Zero or absent leaves it unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// Addresses to assign, in order.
    #[serde(default)]
    pub addresses: Vec<Cidr>,
    /// Routes to install, in order.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

impl MigrationRequest {
    /// Creates a request that keeps the interface name and changes nothing else.
    #[must_use]
    pub fn new(target_namespace: impl Into<PathBuf>, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        Self {
            target_namespace: target_namespace.into(),
            desired_interface_name: interface.clone(),
            source_interface_name: interface,
            mtu: None,
            addresses: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Returns the MTU to apply, treating zero as unset.
    #[must_use]
    pub fn effective_mtu(&self) -> Option<u32> {
        self.mtu.filter(|&mtu| mtu > 0)
    }

    /// Checks the request invariants.
    ///
    /// # Errors
    ///
    /// Returns [`InfradError::InvalidRequest`] if the namespace path is empty,
    /// an interface name is empty or malformed, or a route is inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.target_namespace.as_os_str().is_empty() {
            return Err(InfradError::InvalidRequest {
                message: "target namespace is empty".into(),
            });
        }
        validate_interface_name("source interface", &self.source_interface_name)?;
        validate_interface_name("desired interface", &self.desired_interface_name)?;
        for route in &self.routes {
            route.validate()?;
        }
        Ok(())
    }
}

fn validate_interface_name(what: &str, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "is empty"
    } else if name.len() > MAX_INTERFACE_NAME_LEN {
        "is longer than 15 bytes"
    } else if name == "." || name == ".." {
        "is reserved"
    } else if name.chars().any(|c| c == '/' || c == ':' || c.is_whitespace()) {
        "contains '/', ':' or whitespace"
    } else {
        return Ok(());
    };
    Err(InfradError::InvalidRequest {
        message: format!("{what} name {name:?} {reason}"),
    })
}

/// Resolves a namespace argument to a path.
///
/// Bare names (`ns1`) refer to namespaces created by `ip netns add` and live
/// under `/var/run/netns`. Anything containing a `/` is taken as a path.
#[must_use]
pub fn netns_path(arg: &str) -> PathBuf {
    if arg.contains('/') {
        PathBuf::from(arg)
    } else {
        Path::new(NETNS_RUN_DIR).join(arg)
    }
}

/// Status reported by an in-process server to the health gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// The server has not started yet.
    #[default]
    Starting,
    /// The server is running and serving requests.
    Ok,
    /// The server has stopped.
    Stopped,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Ok => write!(f, "ok"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
