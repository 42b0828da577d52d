//! Linux network namespace handles.
//!
//! Provides safe wrappers around `setns(2)` for binding the calling thread
//! to a network namespace and returning it to where it came from.

pub mod network;

use std::fmt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub use network::{NamespaceGuard, NetNamespace};

use crate::error::KernelError;

/// Namespace file of the calling thread. Namespace membership is per thread,
/// so `/proc/self` (the thread group leader) would be wrong here.
pub const THREAD_NETNS_PATH: &str = "/proc/thread-self/ns/net";

/// Identity of a network namespace: the device and inode of its nsfs file.
///
/// Two handles on the same namespace compare equal regardless of the path
/// they were opened through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId {
    dev: u64,
    ino: u64,
}

impl NamespaceId {
    /// Creates an identity from raw device and inode numbers.
    #[must_use]
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Returns the identity of the namespace file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat'ed.
    pub fn of_path(path: &Path) -> Result<Self, KernelError> {
        let meta = std::fs::metadata(path).map_err(|e| KernelError::io("stat netns", e))?;
        Ok(Self::new(meta.dev(), meta.ino()))
    }

    /// Returns the inode number, as shown by `readlink /proc/<pid>/ns/net`.
    #[must_use]
    pub const fn inode(&self) -> u64 {
        self.ino
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net:[{}]", self.ino)
    }
}

/// Returns the identity of the namespace the calling thread is bound to.
///
/// # Errors
///
/// Returns an error if `/proc/thread-self/ns/net` cannot be stat'ed.
pub fn current_netns_id() -> Result<NamespaceId, KernelError> {
    NamespaceId::of_path(Path::new(THREAD_NETNS_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_procfs_format() {
        assert_eq!(NamespaceId::new(4, 4_026_531_840).to_string(), "net:[4026531840]");
    }

    #[test]
    fn current_namespace_is_stable_on_one_thread() {
        let first = current_netns_id().unwrap();
        let second = current_netns_id().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn inode_matches_procfs_link() {
        let id = current_netns_id().unwrap();
        let link = std::fs::read_link(THREAD_NETNS_PATH).unwrap();
        assert_eq!(link.to_str().unwrap(), format!("net:[{}]", id.inode()));
    }

    #[test]
    fn missing_path_is_io_error() {
        let err = NamespaceId::of_path(Path::new("/nonexistent/netns")).unwrap_err();
        assert!(matches!(err, KernelError::Io { .. }));
    }
}
