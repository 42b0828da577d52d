//! Network namespace handles and thread binding.
//!
//! A [`NetNamespace`] keeps the namespace file open so the namespace stays
//! resolvable for the lifetime of the handle, even if its bind mount is
//! removed in the meantime.

use std::fs::File;
use std::marker::PhantomData;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nix::sched::{CloneFlags, setns};
use nix::sys::statfs::{FsType, fstatfs};

use super::{NamespaceId, THREAD_NETNS_PATH};
use crate::error::KernelError;

/// Magic number of the nsfs pseudo filesystem backing `/proc/<pid>/ns/*`.
const NSFS_MAGIC: FsType = FsType(0x6e73_6673);

/// An open network namespace.
#[derive(Debug)]
pub struct NetNamespace {
    path: PathBuf,
    file: File,
    id: NamespaceId,
}

impl NetNamespace {
    /// Opens the network namespace at `path`.
    ///
    /// Accepts `ip netns` bind mounts (`/var/run/netns/<name>`) and
    /// procfs entries (`/proc/<pid>/ns/net`). Both resolve to an nsfs inode
    /// once opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, or is not a network
    /// namespace file. Other namespace types are rejected too.
    pub fn open(path: &Path) -> Result<Self, KernelError> {
        let file = File::open(path).map_err(|e| KernelError::io("open netns", e))?;
        let not_a_namespace = || KernelError::NotANamespace {
            path: path.to_path_buf(),
        };

        let fs_type = fstatfs(&file)
            .map_err(|e| KernelError::errno("fstatfs", e))?
            .filesystem_type();
        if fs_type != NSFS_MAGIC {
            return Err(not_a_namespace());
        }

        let meta = file.metadata().map_err(|e| KernelError::io("stat netns", e))?;
        let id = NamespaceId::new(meta.dev(), meta.ino());
        if !is_network_namespace(&file, id)? {
            return Err(not_a_namespace());
        }
        tracing::debug!(path = %path.display(), netns = %id, "opened network namespace");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            id,
        })
    }

    /// Opens the namespace the calling thread is currently bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if `/proc/thread-self/ns/net` cannot be opened.
    pub fn current() -> Result<Self, KernelError> {
        Self::open(Path::new(THREAD_NETNS_PATH))
    }

    /// Returns the path this namespace was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the namespace identity.
    #[must_use]
    pub const fn id(&self) -> NamespaceId {
        self.id
    }

    /// Binds the calling thread to this namespace.
    ///
    /// The returned guard restores the thread's previous namespace when
    /// [`NamespaceGuard::exit`] is called or when it is dropped. Only the
    /// calling thread is affected; other threads of the process keep their
    /// namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the current namespace cannot be saved or
    /// `setns(2)` fails.
    pub fn enter(&self) -> Result<NamespaceGuard, KernelError> {
        let original = File::open(THREAD_NETNS_PATH).map_err(|e| KernelError::io("save netns", e))?;
        setns(&self.file, CloneFlags::CLONE_NEWNET).map_err(|e| KernelError::errno("setns", e))?;
        tracing::trace!(netns = %self.id, path = %self.path.display(), "entered network namespace");
        Ok(NamespaceGuard {
            original: Some(original),
            entered: self.id,
            _not_send: PhantomData,
        })
    }
}

/// nsfs names each inode `<type>:[<inode>]`; only `net` is accepted.
fn is_network_namespace(file: &File, id: NamespaceId) -> Result<bool, KernelError> {
    let link = std::fs::read_link(format!("/proc/thread-self/fd/{}", file.as_raw_fd()))
        .map_err(|e| KernelError::io("read namespace type", e))?;
    Ok(link.as_os_str() == format!("net:[{}]", id.inode()).as_str())
}

impl AsFd for NetNamespace {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for NetNamespace {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Keeps the calling thread bound to a namespace until exited or dropped.
///
/// Not `Send`: the binding belongs to the thread that created the guard.
#[derive(Debug)]
#[must_use = "dropping the guard immediately restores the original namespace"]
pub struct NamespaceGuard {
    original: Option<File>,
    entered: NamespaceId,
    _not_send: PhantomData<*const ()>,
}

impl NamespaceGuard {
    /// Restores the thread's original namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if `setns(2)` back to the original namespace fails.
    /// The thread is then left in the entered namespace.
    pub fn exit(mut self) -> Result<(), KernelError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), KernelError> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };
        setns(&original, CloneFlags::CLONE_NEWNET).map_err(|e| KernelError::errno("setns", e))?;
        tracing::trace!(netns = %self.entered, "restored original network namespace");
        Ok(())
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(
                netns = %self.entered,
                error = %e,
                "failed to restore network namespace, thread stays bound to it"
            );
        }
    }
}
