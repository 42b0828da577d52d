//! Errors raised by the health gateway and its probes.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while serving or probing.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Failed to bind the HTTP listener.
    #[error("failed to bind health server to {address}: {source}")]
    BindAddress {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("failed to serve health requests: {0}")]
    ServeError(#[source] std::io::Error),

    /// A probe target is not a valid `host:port`.
    #[error("invalid probe target {target}: {source}")]
    InvalidTarget {
        /// Offending target.
        target: String,
        /// Parse failure.
        #[source]
        source: tonic::transport::Error,
    },

    /// The probe could not connect to its target.
    #[error("cannot connect to {target}: {source}")]
    Connect {
        /// Probed target.
        target: String,
        /// Transport failure.
        #[source]
        source: tonic::transport::Error,
    },

    /// The health RPC failed.
    #[error("health check of {target} failed: {source}")]
    Rpc {
        /// Probed target.
        target: String,
        /// Status returned by the server or the transport.
        #[source]
        source: tonic::Status,
    },

    /// The probe did not complete in time.
    #[error("health check of {target} timed out after {after:?}")]
    Timeout {
        /// Probed target.
        target: String,
        /// Configured bound.
        after: Duration,
    },
}

impl HealthError {
    /// Create a bind address error
    pub fn bind_address(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::BindAddress {
            address: address.into(),
            source,
        }
    }
}
