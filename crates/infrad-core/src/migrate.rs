//! Interface namespace migration.
//!
//! Moves one interface from the host namespace into a workload's namespace
//! and configures it there. The sequence is fixed:
//!
//! 1. resolve the target namespace
//! 2. resolve the interface in the host namespace
//! 3. set it down
//! 4. apply the MTU, if one was requested
//! 5. move it into the target namespace
//! 6. rename it (inside the target namespace)
//! 7. resolve it again by its new name
//! 8. assign addresses
//! 9. set it up
//! 10. install routes
//!
//! Steps 6 to 10 run with the calling thread bound to the target namespace.
//! The first failure stops the sequence. Nothing is rolled back and nothing
//! is retried: a caller that wants to retry must start over from step 2 and
//! must not assume the interface is still in the host namespace.

use std::fmt;
use std::path::PathBuf;

use infrad_common::error::InfradError;
use infrad_common::types::{Cidr, MigrationRequest, RouteSpec};
use thiserror::Error;

use crate::error::KernelError;
use crate::link::{InterfaceHandle, LinkOps, LinkState, MovedLink};

/// One step of the migration sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MigrationStep {
    /// Request invariants are checked before any kernel call.
    Validate,
    /// Step 1: open the target namespace.
    ResolveNamespace,
    /// Step 2: find the interface in the host namespace.
    ResolveInterface,
    /// Step 3: set the interface down.
    Quiesce,
    /// Step 4: apply the requested MTU.
    SetMtu,
    /// Step 5: move the interface into the target namespace.
    MoveToNamespace,
    /// Bind the calling thread to the target namespace.
    EnterNamespace,
    /// Step 6: give the interface its final name.
    Rename,
    /// Step 7: resolve the interface again under its new name.
    Reresolve,
    /// Step 8: assign addresses.
    AssignAddresses,
    /// Step 9: set the interface up.
    Activate,
    /// Step 10: install routes.
    InstallRoutes,
    /// Return the calling thread to its original namespace.
    RestoreNamespace,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::ResolveNamespace => "resolve-namespace",
            Self::ResolveInterface => "resolve-interface",
            Self::Quiesce => "quiesce",
            Self::SetMtu => "set-mtu",
            Self::MoveToNamespace => "move-to-namespace",
            Self::EnterNamespace => "enter-namespace",
            Self::Rename => "rename",
            Self::Reresolve => "re-resolve",
            Self::AssignAddresses => "assign-addresses",
            Self::Activate => "activate",
            Self::InstallRoutes => "install-routes",
            Self::RestoreNamespace => "restore-namespace",
        };
        f.write_str(name)
    }
}

/// Where an interface lookup happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The namespace the migrator was called from.
    Host,
    /// The workload namespace the interface is moved into.
    Target,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Why a migration stopped.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The request violates its invariants. No kernel call was made.
    #[error(transparent)]
    InvalidRequest(InfradError),

    /// The target namespace could not be opened. No kernel state was changed.
    #[error("network namespace {path} not found: {source}")]
    NamespaceNotFound {
        /// Requested namespace path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// The interface could not be resolved.
    ///
    /// In the [`Scope::Target`] namespace this means the interface vanished
    /// between rename and lookup, an internal consistency failure.
    #[error("interface {name} not found in {scope} namespace: {source}")]
    InterfaceNotFound {
        /// Name that was looked up.
        name: String,
        /// Namespace the lookup ran in.
        scope: Scope,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// Setting the interface up or down failed.
    #[error("cannot set {interface} {state}: {source}")]
    LinkState {
        /// Interface name.
        interface: String,
        /// State that was requested.
        state: LinkState,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// Applying the MTU failed.
    #[error("cannot set MTU {mtu} on {interface}: {source}")]
    Configuration {
        /// Interface name.
        interface: String,
        /// Requested MTU.
        mtu: u32,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// Moving the interface into the target namespace failed.
    #[error("cannot move {interface} into {path}: {source}")]
    NamespaceMove {
        /// Interface name.
        interface: String,
        /// Target namespace path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// Entering or leaving the target namespace failed.
    #[error("cannot {} network namespace {path}: {source}", switch_verb(.step))]
    NamespaceSwitch {
        /// [`MigrationStep::EnterNamespace`] or [`MigrationStep::RestoreNamespace`].
        step: MigrationStep,
        /// Target namespace path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// Renaming the interface failed.
    #[error("cannot rename {from} to {to}: {source}")]
    Rename {
        /// Name before the rename.
        from: String,
        /// Requested name.
        to: String,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// An address could not be assigned. Earlier entries were applied.
    #[error("cannot assign address #{index} ({address}) to {interface}: {source}")]
    AddressAssignment {
        /// Position of the failing entry in the request.
        index: usize,
        /// The failing address.
        address: Cidr,
        /// Interface name.
        interface: String,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },

    /// A route could not be installed. Earlier entries were applied.
    #[error("cannot install route #{index} ({route}): {source}")]
    RouteInstall {
        /// Position of the failing entry in the request.
        index: usize,
        /// The failing route.
        route: RouteSpec,
        /// Underlying failure.
        #[source]
        source: KernelError,
    },
}

impl MigrationError {
    /// Returns the step that failed.
    #[must_use]
    pub const fn step(&self) -> MigrationStep {
        match self {
            Self::InvalidRequest(_) => MigrationStep::Validate,
            Self::NamespaceNotFound { .. } => MigrationStep::ResolveNamespace,
            Self::InterfaceNotFound {
                scope: Scope::Host, ..
            } => MigrationStep::ResolveInterface,
            Self::InterfaceNotFound {
                scope: Scope::Target,
                ..
            } => MigrationStep::Reresolve,
            Self::LinkState {
                state: LinkState::Down,
                ..
            } => MigrationStep::Quiesce,
            Self::LinkState {
                state: LinkState::Up, ..
            } => MigrationStep::Activate,
            Self::Configuration { .. } => MigrationStep::SetMtu,
            Self::NamespaceMove { .. } => MigrationStep::MoveToNamespace,
            Self::NamespaceSwitch { step, .. } => *step,
            Self::Rename { .. } => MigrationStep::Rename,
            Self::AddressAssignment { .. } => MigrationStep::AssignAddresses,
            Self::RouteInstall { .. } => MigrationStep::InstallRoutes,
        }
    }

    /// Returns the position of the failing address or route, if the failed
    /// step iterates a list.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::AddressAssignment { index, .. } | Self::RouteInstall { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Returns whether the interface may already have left the host namespace.
    ///
    /// A failed move is included: the kernel may have completed it before
    /// reporting the error.
    #[must_use]
    pub fn may_have_left_host(&self) -> bool {
        self.step() >= MigrationStep::MoveToNamespace
    }
}

/// Runs the migration sequence against a [`LinkOps`] backend.
///
/// Not reentrant: invocations touching the same interface or the same target
/// namespace must be serialized by the caller.
#[derive(Debug)]
pub struct Migrator<K> {
    ops: K,
}

impl<K: LinkOps> Migrator<K> {
    /// Creates a migrator issuing kernel calls through `ops`.
    pub const fn new(ops: K) -> Self {
        Self { ops }
    }

    /// Returns the kernel backend.
    pub const fn ops(&self) -> &K {
        &self.ops
    }

    /// Moves `request.source_interface_name` into `request.target_namespace`
    /// and configures it.
    ///
    /// Runs entirely on the calling thread. The thread's namespace is the
    /// same on return as on entry, on success and on failure.
    ///
    /// # Errors
    ///
    /// Returns the first failing step. Steps before it took effect and are
    /// not undone; steps after it were not attempted.
    pub fn migrate(&self, request: &MigrationRequest) -> Result<(), MigrationError> {
        let span = tracing::info_span!(
            "migrate",
            interface = %request.source_interface_name,
            netns = %request.target_namespace.display(),
        );
        let _span = span.enter();

        request.validate().map_err(MigrationError::InvalidRequest)?;
        let path = &request.target_namespace;
        let source_name = request.source_interface_name.as_str();

        step(MigrationStep::ResolveNamespace);
        let netns = self
            .ops
            .get_netns(path)
            .map_err(|source| MigrationError::NamespaceNotFound {
                path: path.clone(),
                source,
            })?;

        step(MigrationStep::ResolveInterface);
        let link = self
            .ops
            .link_by_name(source_name)
            .map_err(|source| MigrationError::InterfaceNotFound {
                name: source_name.to_owned(),
                scope: Scope::Host,
                source,
            })?;

        step(MigrationStep::Quiesce);
        self.set_state(&link, LinkState::Down)?;

        if let Some(mtu) = request.effective_mtu() {
            step(MigrationStep::SetMtu);
            self.ops
                .link_set_mtu(&link, mtu)
                .map_err(|source| MigrationError::Configuration {
                    interface: source_name.to_owned(),
                    mtu,
                    source,
                })?;
        }

        step(MigrationStep::MoveToNamespace);
        let moved = self
            .ops
            .link_set_netns(link, &netns)
            .map_err(|source| MigrationError::NamespaceMove {
                interface: source_name.to_owned(),
                path: path.clone(),
                source,
            })?;

        step(MigrationStep::EnterNamespace);
        let guard = self
            .ops
            .enter_netns(&netns)
            .map_err(|source| MigrationError::NamespaceSwitch {
                step: MigrationStep::EnterNamespace,
                path: path.clone(),
                source,
            })?;

        let configured = self.configure(request, moved);

        step(MigrationStep::RestoreNamespace);
        match (configured, self.ops.exit_netns(guard)) {
            (Ok(()), Ok(())) => {
                tracing::info!(
                    name = %request.desired_interface_name,
                    addresses = request.addresses.len(),
                    routes = request.routes.len(),
                    "interface migrated"
                );
                Ok(())
            }
            (Ok(()), Err(source)) => Err(MigrationError::NamespaceSwitch {
                step: MigrationStep::RestoreNamespace,
                path: path.clone(),
                source,
            }),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore)) => {
                tracing::error!(error = %restore, "failed to leave target namespace after migration failure");
                Err(e)
            }
        }
    }

    /// Steps 6 to 10. The calling thread is bound to the target namespace.
    fn configure(&self, request: &MigrationRequest, moved: MovedLink) -> Result<(), MigrationError> {
        let desired = request.desired_interface_name.as_str();

        step(MigrationStep::Rename);
        let from = moved.name().to_owned();
        self.ops
            .link_set_name(moved, desired)
            .map_err(|source| MigrationError::Rename {
                from,
                to: desired.to_owned(),
                source,
            })?;

        step(MigrationStep::Reresolve);
        let link = self
            .ops
            .link_by_name(desired)
            .map_err(|source| MigrationError::InterfaceNotFound {
                name: desired.to_owned(),
                scope: Scope::Target,
                source,
            })?;

        step(MigrationStep::AssignAddresses);
        for (index, address) in request.addresses.iter().enumerate() {
            self.ops
                .addr_add(&link, address)
                .map_err(|source| MigrationError::AddressAssignment {
                    index,
                    address: *address,
                    interface: desired.to_owned(),
                    source,
                })?;
            tracing::debug!(index, %address, "address assigned");
        }

        step(MigrationStep::Activate);
        self.set_state(&link, LinkState::Up)?;

        step(MigrationStep::InstallRoutes);
        for (index, route) in request.routes.iter().enumerate() {
            let route_err = |source: KernelError| MigrationError::RouteInstall {
                index,
                route: route.clone(),
                source,
            };
            let resolved;
            let device = match route.device.as_deref() {
                Some(dev) if dev != desired => {
                    resolved = self.ops.link_by_name(dev).map_err(route_err)?;
                    &resolved
                }
                _ => &link,
            };
            self.ops.route_add(device, route).map_err(route_err)?;
            tracing::debug!(index, %route, "route installed");
        }
        Ok(())
    }

    fn set_state(&self, link: &InterfaceHandle, state: LinkState) -> Result<(), MigrationError> {
        self.ops
            .link_set_state(link, state)
            .map_err(|source| MigrationError::LinkState {
                interface: link.name().to_owned(),
                state,
                source,
            })
    }
}

fn switch_verb(step: &MigrationStep) -> &'static str {
    if *step == MigrationStep::EnterNamespace {
        "enter"
    } else {
        "leave"
    }
}

fn step(step: MigrationStep) {
    tracing::debug!(%step, "migration step");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_ordered() {
        assert!(MigrationStep::ResolveNamespace < MigrationStep::ResolveInterface);
        assert!(MigrationStep::MoveToNamespace < MigrationStep::Rename);
        assert!(MigrationStep::Activate < MigrationStep::InstallRoutes);
    }

    #[test]
    fn error_reports_step_and_index() {
        let err = MigrationError::AddressAssignment {
            index: 2,
            address: "10.0.0.5/24".parse().unwrap(),
            interface: "net1".into(),
            source: KernelError::NoSuchDevice {
                name: "net1".into(),
            },
        };
        assert_eq!(err.step(), MigrationStep::AssignAddresses);
        assert_eq!(err.index(), Some(2));
        assert!(err.may_have_left_host());
        assert!(err.to_string().starts_with("cannot assign address #2 (10.0.0.5/24) to net1"));
    }

    #[test]
    fn host_lookup_failure_keeps_interface_in_host() {
        let err = MigrationError::InterfaceNotFound {
            name: "eth0".into(),
            scope: Scope::Host,
            source: KernelError::NoSuchDevice {
                name: "eth0".into(),
            },
        };
        assert_eq!(err.step(), MigrationStep::ResolveInterface);
        assert_eq!(err.index(), None);
        assert!(!err.may_have_left_host());
    }

    #[test]
    fn namespace_switch_message_names_direction() {
        let err = MigrationError::NamespaceSwitch {
            step: MigrationStep::RestoreNamespace,
            path: "/var/run/netns/ns1".into(),
            source: KernelError::errno("setns", nix::errno::Errno::EPERM),
        };
        assert!(err.to_string().starts_with("cannot leave network namespace /var/run/netns/ns1"));
    }
}
