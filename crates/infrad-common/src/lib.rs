//! # infrad-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the infrad workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the request and config primitives that the
//! migrator, the health gateway and the CLI all build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
