//! Failures of individual kernel calls.
//!
//! [`KernelError`] is the reason wrapped by every
//! [`MigrationError`](crate::migrate::MigrationError) variant.

use std::path::PathBuf;

use thiserror::Error;

use crate::namespace::NamespaceId;

/// A single kernel-facing operation failed.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A file-level operation on a namespace or procfs entry failed.
    #[error("{call} failed: {source}")]
    Io {
        /// Operation that failed.
        call: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A raw system call returned an error.
    #[error("{call} failed: {source}")]
    Errno {
        /// System call that failed.
        call: &'static str,
        /// Returned errno.
        #[source]
        source: nix::errno::Errno,
    },

    /// The kernel rejected a netlink request.
    #[error("netlink {call} failed: {message}")]
    Netlink {
        /// Netlink request that failed.
        call: &'static str,
        /// Error reported by the netlink layer.
        message: String,
    },

    /// No interface with the given name exists in the current namespace.
    #[error("no such device: {name}")]
    NoSuchDevice {
        /// Interface name that was looked up.
        name: String,
    },

    /// The path exists but does not refer to a network namespace.
    #[error("{path} is not a network namespace")]
    NotANamespace {
        /// Offending path.
        path: PathBuf,
    },

    /// An interface handle was used outside the namespace it was resolved in.
    #[error("stale handle for {interface}: resolved in {resolved_in}, calling thread is in {current}")]
    StaleHandle {
        /// Interface the handle refers to.
        interface: String,
        /// Namespace the handle was resolved in.
        resolved_in: NamespaceId,
        /// Namespace the calling thread is bound to.
        current: NamespaceId,
    },

    /// The request cannot be expressed to the kernel.
    #[error("invalid argument to {call}: {message}")]
    InvalidArgument {
        /// Operation that was attempted.
        call: &'static str,
        /// Why the argument was rejected.
        message: String,
    },
}

impl KernelError {
    pub(crate) const fn io(call: &'static str, source: std::io::Error) -> Self {
        Self::Io { call, source }
    }

    pub(crate) const fn errno(call: &'static str, source: nix::errno::Errno) -> Self {
        Self::Errno { call, source }
    }

    pub(crate) fn netlink(call: &'static str, err: &rtnetlink::Error) -> Self {
        Self::Netlink {
            call,
            message: err.to_string(),
        }
    }
}
