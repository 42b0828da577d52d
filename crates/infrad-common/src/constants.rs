//! System-wide constants and default endpoints.

/// Default address the health gateway listens on.
pub const DEFAULT_HEALTH_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default port of the health gateway.
pub const DEFAULT_HEALTH_SERVER_PORT: u16 = 9000;

/// Default gRPC endpoint of the infra manager.
pub const DEFAULT_INFRA_MANAGER_TARGET: &str = "127.0.0.1:50002";

/// Default gRPC endpoint of the infra agent (CNI server).
pub const DEFAULT_INFRA_AGENT_TARGET: &str = "127.0.0.1:50001";

/// Default upper bound for a single downstream health probe, in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Default time in-flight health requests get to finish on shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// HTTP path of the aggregated liveness check.
pub const HEALTH_CHECK_PATH: &str = "/check";

/// Directory where named network namespaces are bind-mounted by `ip netns`.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// Maximum length of a network interface name (`IFNAMSIZ` minus the NUL).
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Binary name for the CLI.
pub const BIN_NAME: &str = "infrad";
