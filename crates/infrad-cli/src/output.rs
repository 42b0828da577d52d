//! Human-readable summaries of migration outcomes, written to stderr.

use infrad_common::types::MigrationRequest;
use infrad_core::migrate::MigrationError;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Reports a completed migration.
pub fn print_migration_done(request: &MigrationRequest) {
    eprintln!(
        "  {GREEN}●{RESET} {BOLD}{}{RESET} is now {BOLD}{}{RESET} in {}",
        request.source_interface_name,
        request.desired_interface_name,
        request.target_namespace.display()
    );
    eprintln!("    {DIM}{}{RESET}", summary(request));
}

/// Reports a failed migration and where the interface may have been left.
pub fn print_migration_failed(request: &MigrationRequest, error: &MigrationError) {
    eprintln!(
        "  {RED}●{RESET} {BOLD}{}{RESET} failed at step {BOLD}{}{RESET}",
        request.source_interface_name,
        error.step()
    );
    if let Some(index) = error.index() {
        eprintln!("    {DIM}failing entry: #{index}{RESET}");
    }
    eprintln!("    {}", location_hint(request, error));
}

fn location_hint(request: &MigrationRequest, error: &MigrationError) -> String {
    if error.may_have_left_host() {
        format!(
            "{YELLOW}Note:{RESET} the interface may already be in {}; no rollback was attempted.",
            request.target_namespace.display()
        )
    } else {
        "The interface was not moved out of the host namespace.".to_owned()
    }
}

fn summary(request: &MigrationRequest) -> String {
    let mut parts = Vec::new();
    if let Some(mtu) = request.effective_mtu() {
        parts.push(format!("mtu {mtu}"));
    }
    parts.extend(request.addresses.iter().map(ToString::to_string));
    parts.extend(request.routes.iter().map(|route| format!("route {route}")));
    if parts.is_empty() {
        "no addressing requested".to_owned()
    } else {
        parts.join(", ")
    }
}
