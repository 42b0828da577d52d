//! In-process server status, read by the gateway's last check.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use infrad_common::types::ServerStatus;

/// Source of the local status the gateway reports on.
///
/// Injected at construction so the gateway never reads ambient global state.
pub trait StatusProvider: Send + Sync {
    /// Returns the current status. Must not block.
    fn status(&self) -> ServerStatus;
}

/// A shared, thread-safe status cell.
///
/// Clones share the same cell: the owning server keeps one clone to
/// [`set`](Self::set) and hands another to the gateway.
#[derive(Debug, Clone, Default)]
pub struct StatusFlag(Arc<AtomicU8>);

impl StatusFlag {
    /// Creates a flag in [`ServerStatus::Starting`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag holding `status`.
    #[must_use]
    pub fn with_status(status: ServerStatus) -> Self {
        let flag = Self::new();
        flag.set(status);
        flag
    }

    /// Publishes a new status.
    pub fn set(&self, status: ServerStatus) {
        self.0.store(encode(status), Ordering::Release);
    }

    /// Reads the current status.
    #[must_use]
    pub fn get(&self) -> ServerStatus {
        decode(self.0.load(Ordering::Acquire))
    }
}

impl StatusProvider for StatusFlag {
    fn status(&self) -> ServerStatus {
        self.get()
    }
}

const fn encode(status: ServerStatus) -> u8 {
    match status {
        ServerStatus::Starting => 0,
        ServerStatus::Ok => 1,
        ServerStatus::Stopped => 2,
    }
}

const fn decode(raw: u8) -> ServerStatus {
    match raw {
        1 => ServerStatus::Ok,
        2 => ServerStatus::Stopped,
        _ => ServerStatus::Starting,
    }
}
