//! # infrad-core
//!
//! Moves a network interface from the host network namespace into a
//! workload's namespace and configures it there.
//!
//! This crate provides:
//! - **Namespaces**: owned handles on network namespace files and a guard
//!   that binds the calling thread to a namespace and restores it on exit.
//! - **Links**: namespace-scoped interface handles and the [`link::LinkOps`]
//!   kernel-call seam, with an rtnetlink implementation.
//! - **Migration**: the fixed, non-transactional ten-step move-and-configure
//!   sequence in [`migrate::Migrator`].
//!
//! All namespace switching is encapsulated in safe wrappers. The calling
//! thread's namespace is always restored before a migration returns.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod link;
pub mod migrate;
pub mod namespace;
