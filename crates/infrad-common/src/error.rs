//! Unified error types for the infrad workspace.
//!
//! Each higher-level crate defines its own domain-specific error enum that wraps
//! these common variants when appropriate.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum InfradError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A migration request violates its invariants.
    #[error("invalid migration request: {message}")]
    InvalidRequest {
        /// Description of the violated invariant.
        message: String,
    },

    /// A textual value could not be parsed.
    #[error("cannot parse {kind} from {input:?}: {reason}")]
    Parse {
        /// Type of the value being parsed.
        kind: &'static str,
        /// Offending input.
        input: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl InfradError {
    pub(crate) fn parse(kind: &'static str, input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            input: input.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, InfradError>;
