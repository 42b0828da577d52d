//! Integration tests for interface namespace migration.
//!
//! These tests are implemented in:
//! `crates/infrad-core/tests/migrate_test.rs`
//!
//! They run against an in-memory kernel model, so they need no privileges.
//!
//! Covered scenarios:
//! - `empty_request_moves_renames_and_activates`: end state in the target namespace
//! - `full_request_matches_expected_end_state`: ns1/eth0 renamed net1 with MTU, address and default route
//! - `steps_run_in_fixed_order`: kernel calls are never reordered
//! - `failure_at_each_step_halts_everything_after_it`
//! - `address_failure_reports_exact_index` / `route_failure_reports_exact_index`
//! - `thread_namespace_restored_after_failure_inside_target`
//! - `rerun_after_success_fails_interface_lookup`: `InterfaceNotFound` in the host namespace
//! - `stale_handle_is_rejected_by_backend`
