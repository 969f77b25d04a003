//! Catalog filtering against a server selection

use super::types::{SelectionError, Server, ServerSelection, TransportProtocol};
use tracing::debug;

/// Keep the servers matching every filter set in `selection`
///
/// String filters compare case-insensitively and an empty filter list
/// accepts everything. Servers that cannot carry `protocol` are dropped.
///
/// # Errors
///
/// Returns `SelectionError::NoServerFound` when nothing matches.
pub fn filter_servers(
    servers: &[Server],
    selection: &ServerSelection,
    protocol: TransportProtocol,
) -> Result<Vec<Server>, SelectionError> {
    let filtered: Vec<Server> = servers
        .iter()
        .filter(|server| matches_selection(server, selection, protocol))
        .cloned()
        .collect();

    debug!(
        "{} of {} servers match the selection ({})",
        filtered.len(),
        servers.len(),
        protocol
    );

    if filtered.is_empty() {
        return Err(SelectionError::NoServerFound);
    }

    Ok(filtered)
}

fn matches_selection(
    server: &Server,
    selection: &ServerSelection,
    protocol: TransportProtocol,
) -> bool {
    server.supports(protocol)
        && (!selection.port_forward_only || server.port_forward)
        && matches_any(&server.country, &selection.countries)
        && matches_any(&server.region, &selection.regions)
        && matches_any(&server.city, &selection.cities)
        && matches_any(&server.hostname, &selection.hostnames)
        && matches_optional(server.name.as_deref(), &selection.names)
}

fn matches_any(value: &str, possibilities: &[String]) -> bool {
    possibilities.is_empty()
        || possibilities
            .iter()
            .any(|possibility| possibility.eq_ignore_ascii_case(value))
}

// A server without a value never satisfies a non-empty filter.
fn matches_optional(value: Option<&str>, possibilities: &[String]) -> bool {
    match value {
        Some(value) => matches_any(value, possibilities),
        None => possibilities.is_empty(),
    }
}
