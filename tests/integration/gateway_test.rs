//! Integration tests for the liveness gateway.
//!
//! These tests are implemented in:
//! `crates/infrad-health/tests/gateway_test.rs`
//!
//! Covered scenarios:
//! - `all_checks_passing_returns_ok`: both probes serving and status OK
//! - `manager_failure_short_circuits`: later checks are not attempted
//! - `unreachable_agent_short_circuits_before_status`
//! - `nothing_is_cached_between_requests`
//! - `grpc_probe_reads_serving_status`: against a real `grpc.health.v1` server
//! - `gateway_against_real_health_services`
//! - `serves_until_shutdown` / `shutdown_gives_up_after_grace_period`
