//! Namespace-scoped interface handles and the kernel-call seam.
//!
//! An [`InterfaceHandle`] is only meaningful inside the namespace it was
//! resolved in. Moving the interface to another namespace consumes the handle
//! and yields a [`MovedLink`], which can only be renamed. Any further mutation
//! needs a fresh handle resolved by name inside the new namespace.

pub mod netlink;

use std::fmt;
use std::path::Path;

use infrad_common::types::{Cidr, RouteSpec};

pub use netlink::NetlinkBackend;

use crate::error::KernelError;
use crate::namespace::NamespaceId;

/// A live reference to a kernel network interface inside one namespace.
///
/// Deliberately neither `Clone` nor `Copy`: the handle stops being valid the
/// moment the interface changes namespace, and
/// [`LinkOps::link_set_netns`] takes it by value.
#[derive(Debug, PartialEq, Eq)]
pub struct InterfaceHandle {
    index: u32,
    name: String,
    namespace: NamespaceId,
}

impl InterfaceHandle {
    /// Creates a handle. Only [`LinkOps`] implementations should call this,
    /// right after resolving the interface in `namespace`.
    #[must_use]
    pub fn new(index: u32, name: impl Into<String>, namespace: NamespaceId) -> Self {
        Self {
            index,
            name: name.into(),
            namespace,
        }
    }

    /// Kernel interface index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Interface name at resolution time.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the handle was resolved in.
    #[must_use]
    pub const fn namespace(&self) -> NamespaceId {
        self.namespace
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.name, self.index, self.namespace)
    }
}

/// An interface that has just crossed into another namespace.
///
/// Carries just enough to address the device once more, for the rename that
/// follows the move.
#[derive(Debug, PartialEq, Eq)]
pub struct MovedLink {
    index: u32,
    name: String,
    namespace: NamespaceId,
}

impl MovedLink {
    /// Records that `link` now lives in `namespace`.
    #[must_use]
    pub fn new(link: InterfaceHandle, namespace: NamespaceId) -> Self {
        Self {
            index: link.index,
            name: link.name,
            namespace,
        }
    }

    /// Kernel interface index carried over from before the move.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Name the interface had when it was moved.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the interface was moved into.
    #[must_use]
    pub const fn namespace(&self) -> NamespaceId {
        self.namespace
    }
}

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// `IFF_UP` cleared.
    Down,
    /// `IFF_UP` set.
    Up,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => write!(f, "down"),
            Self::Up => write!(f, "up"),
        }
    }
}

/// Kernel operations the migrator is built from.
///
/// Every method acts on the namespace the calling thread is bound to.
/// Implementations must reject handles resolved in another namespace.
pub trait LinkOps {
    /// An open network namespace.
    type Netns;
    /// Binding of the calling thread to a namespace, restored by [`LinkOps::exit_netns`].
    type Guard;

    /// Opens the network namespace at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve to a network namespace.
    fn get_netns(&self, path: &Path) -> Result<Self::Netns, KernelError>;

    /// Binds the calling thread to `netns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot switch namespace.
    fn enter_netns(&self, netns: &Self::Netns) -> Result<Self::Guard, KernelError>;

    /// Returns the calling thread to the namespace it was in before `guard` was taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the original namespace cannot be restored.
    fn exit_netns(&self, guard: Self::Guard) -> Result<(), KernelError>;

    /// Resolves an interface by name in the current namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if no such interface exists.
    fn link_by_name(&self, name: &str) -> Result<InterfaceHandle, KernelError>;

    /// Sets the administrative state of an interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the change.
    fn link_set_state(&self, link: &InterfaceHandle, state: LinkState) -> Result<(), KernelError>;

    /// Sets the MTU of an interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the MTU.
    fn link_set_mtu(&self, link: &InterfaceHandle, mtu: u32) -> Result<(), KernelError>;

    /// Moves an interface into `netns`, consuming its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refuses the move. The interface is then
    /// still in the current namespace but the handle is gone; resolve it again
    /// if needed.
    fn link_set_netns(
        &self,
        link: InterfaceHandle,
        netns: &Self::Netns,
    ) -> Result<MovedLink, KernelError>;

    /// Renames an interface that was just moved into the current namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread is not bound to the link's new
    /// namespace or the kernel rejects the name.
    fn link_set_name(&self, link: MovedLink, name: &str) -> Result<(), KernelError>;

    /// Adds an address to an interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the address.
    fn addr_add(&self, link: &InterfaceHandle, address: &Cidr) -> Result<(), KernelError>;

    /// Installs a route out of `link`. The route's own device field is ignored;
    /// callers resolve it into `link`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the route.
    fn route_add(&self, link: &InterfaceHandle, route: &RouteSpec) -> Result<(), KernelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moved_link_keeps_index_and_name() {
        let host = NamespaceId::new(4, 1);
        let target = NamespaceId::new(4, 2);
        let moved = MovedLink::new(InterfaceHandle::new(7, "eth0", host), target);
        assert_eq!(moved.index(), 7);
        assert_eq!(moved.name(), "eth0");
        assert_eq!(moved.namespace(), target);
    }

    #[test]
    fn handle_display_names_namespace() {
        let handle = InterfaceHandle::new(3, "net1", NamespaceId::new(4, 99));
        assert_eq!(handle.to_string(), "net1#3@net:[99]");
    }
}
