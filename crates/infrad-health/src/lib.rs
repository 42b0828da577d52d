//! # infrad-health
//!
//! Liveness gateway for the infra agent.
//!
//! Serves `GET /check`, which answers 200 only if, in this order:
//! - the infra manager's gRPC health service reports `SERVING`,
//! - the infra agent's gRPC health service reports `SERVING`,
//! - the injected [`StatusProvider`](status::StatusProvider) reports OK.
//!
//! The first failing check ends evaluation with a 500. Nothing is cached
//! between requests.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod probe;
pub mod server;
pub mod status;

pub use error::HealthError;
