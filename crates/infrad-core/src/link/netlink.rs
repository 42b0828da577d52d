//! [`LinkOps`] over rtnetlink.
//!
//! A netlink socket is bound to the network namespace its creating thread
//! was in at creation time. Every call therefore opens a fresh connection
//! on the calling thread, so that requests issued after a namespace switch
//! reach the namespace the thread is now bound to.

use std::future::Future;
use std::net::IpAddr;
use std::os::fd::AsRawFd;
use std::path::Path;

use futures::TryStreamExt;
use infrad_common::types::{Cidr, RouteSpec};
use rtnetlink::Handle;
use tokio::runtime::{Builder, Runtime};

use super::{InterfaceHandle, LinkOps, LinkState, MovedLink};
use crate::error::KernelError;
use crate::namespace::{NamespaceGuard, NamespaceId, NetNamespace, current_netns_id};

/// Kernel backend issuing rtnetlink requests from the calling thread.
///
/// Drives its own current-thread tokio runtime and blocks on it, so it must
/// not be used from inside another async runtime's worker thread.
#[derive(Debug)]
pub struct NetlinkBackend {
    runtime: Runtime,
}

impl NetlinkBackend {
    /// Creates a backend with a private single-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn new() -> Result<Self, KernelError> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(|e| KernelError::io("build netlink runtime", e))?;
        Ok(Self { runtime })
    }

    /// Runs one rtnetlink request on a connection opened in the current namespace.
    fn request<T, F, Fut>(&self, call: &'static str, f: F) -> Result<T, KernelError>
    where
        F: FnOnce(Handle) -> Fut,
        Fut: Future<Output = Result<T, rtnetlink::Error>>,
    {
        self.runtime.block_on(async move {
            let (connection, handle, _) =
                rtnetlink::new_connection().map_err(|e| KernelError::io("open netlink socket", e))?;
            let driver = tokio::spawn(connection);
            let result = f(handle).await.map_err(|e| KernelError::netlink(call, &e));
            driver.abort();
            result
        })
    }

    /// Rejects handles resolved in a namespace other than the thread's current one.
    fn check_scope(interface: &str, resolved_in: NamespaceId) -> Result<(), KernelError> {
        let current = current_netns_id()?;
        if current != resolved_in {
            return Err(KernelError::StaleHandle {
                interface: interface.to_owned(),
                resolved_in,
                current,
            });
        }
        Ok(())
    }
}

impl LinkOps for NetlinkBackend {
    type Netns = NetNamespace;
    type Guard = NamespaceGuard;

    fn get_netns(&self, path: &Path) -> Result<NetNamespace, KernelError> {
        NetNamespace::open(path)
    }

    fn enter_netns(&self, netns: &NetNamespace) -> Result<NamespaceGuard, KernelError> {
        netns.enter()
    }

    fn exit_netns(&self, guard: NamespaceGuard) -> Result<(), KernelError> {
        guard.exit()
    }

    fn link_by_name(&self, name: &str) -> Result<InterfaceHandle, KernelError> {
        let namespace = current_netns_id()?;
        let owned = name.to_owned();
        let index = self.request("link get", |handle| async move {
            let mut links = handle.link().get().match_name(owned).execute();
            Ok::<_, rtnetlink::Error>(links.try_next().await?.map(|msg| msg.header.index))
        })?;
        let index = index.ok_or_else(|| KernelError::NoSuchDevice {
            name: name.to_owned(),
        })?;
        tracing::trace!(interface = name, index, netns = %namespace, "resolved interface");
        Ok(InterfaceHandle::new(index, name, namespace))
    }

    fn link_set_state(&self, link: &InterfaceHandle, state: LinkState) -> Result<(), KernelError> {
        Self::check_scope(link.name(), link.namespace())?;
        let index = link.index();
        self.request("link set state", |handle| async move {
            let request = handle.link().set(index);
            match state {
                LinkState::Up => request.up().execute().await,
                LinkState::Down => request.down().execute().await,
            }
        })
    }

    fn link_set_mtu(&self, link: &InterfaceHandle, mtu: u32) -> Result<(), KernelError> {
        Self::check_scope(link.name(), link.namespace())?;
        let index = link.index();
        self.request("link set mtu", |handle| async move {
            handle.link().set(index).mtu(mtu).execute().await
        })
    }

    fn link_set_netns(
        &self,
        link: InterfaceHandle,
        netns: &NetNamespace,
    ) -> Result<MovedLink, KernelError> {
        Self::check_scope(link.name(), link.namespace())?;
        let index = link.index();
        let fd = netns.as_raw_fd();
        self.request("link set netns", |handle| async move {
            handle.link().set(index).setns_by_fd(fd).execute().await
        })?;
        Ok(MovedLink::new(link, netns.id()))
    }

    fn link_set_name(&self, link: MovedLink, name: &str) -> Result<(), KernelError> {
        Self::check_scope(link.name(), link.namespace())?;
        let index = link.index();
        let name = name.to_owned();
        self.request("link set name", |handle| async move {
            handle.link().set(index).name(name).execute().await
        })
    }

    fn addr_add(&self, link: &InterfaceHandle, address: &Cidr) -> Result<(), KernelError> {
        Self::check_scope(link.name(), link.namespace())?;
        let index = link.index();
        let (ip, prefix_len) = (address.address(), address.prefix_len());
        self.request("address add", |handle| async move {
            handle.address().add(index, ip, prefix_len).execute().await
        })
    }

    fn route_add(&self, link: &InterfaceHandle, route: &RouteSpec) -> Result<(), KernelError> {
        Self::check_scope(link.name(), link.namespace())?;
        let index = link.index();
        let prefix_len = route.destination.prefix_len();
        match (route.destination.address(), route.gateway) {
            (IpAddr::V4(dst), gateway) => {
                let gateway = match gateway {
                    None => None,
                    Some(IpAddr::V4(gw)) => Some(gw),
                    Some(IpAddr::V6(gw)) => return Err(family_mismatch(route, gw.into())),
                };
                self.request("route add", |handle| async move {
                    let mut request = handle
                        .route()
                        .add()
                        .v4()
                        .destination_prefix(dst, prefix_len)
                        .output_interface(index);
                    if let Some(gw) = gateway {
                        request = request.gateway(gw);
                    }
                    request.execute().await
                })
            }
            (IpAddr::V6(dst), gateway) => {
                let gateway = match gateway {
                    None => None,
                    Some(IpAddr::V6(gw)) => Some(gw),
                    Some(IpAddr::V4(gw)) => return Err(family_mismatch(route, gw.into())),
                };
                self.request("route add", |handle| async move {
                    let mut request = handle
                        .route()
                        .add()
                        .v6()
                        .destination_prefix(dst, prefix_len)
                        .output_interface(index);
                    if let Some(gw) = gateway {
                        request = request.gateway(gw);
                    }
                    request.execute().await
                })
            }
        }
    }
}

fn family_mismatch(route: &RouteSpec, gateway: IpAddr) -> KernelError {
    KernelError::InvalidArgument {
        call: "route add",
        message: format!("gateway {gateway} does not match destination {}", route.destination),
    }
}
