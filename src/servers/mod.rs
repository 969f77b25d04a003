//! Server selection: catalog filtering, candidate building and endpoint choice
//!
//! Resolution runs in three steps:
//! - filter the catalog against a `ServerSelection`
//! - expand matching servers into one `Connection` per address
//! - pick one connection, pinned by target IP or at random
//!
//! Resolution is synchronous and free of shared state; the random source is
//! supplied by the caller.

// Submodules
pub mod connection;
pub mod filter;
pub mod select;
pub mod types;

// Re-export commonly used types
pub use types::{
    Connection, DefaultPorts, OpenVpnSelection, SelectionError, Server, ServerSelection,
    TransportProtocol,
};

// Re-export main functions
pub use connection::{build_connections, resolve_port, resolve_protocol};
pub use filter::filter_servers;
pub use select::{find_target_ip, pick_random, select_connection};

use rand::Rng;

/// Resolve the tunnel endpoint for `selection` over `servers`
///
/// # Errors
///
/// Returns `SelectionError` when no server matches or the pinned target
/// address is not among the candidates.
pub fn resolve_connection<R: Rng + ?Sized>(
    servers: &[Server],
    selection: &ServerSelection,
    defaults: DefaultPorts,
    rng: &mut R,
) -> Result<Connection, SelectionError> {
    let protocol = resolve_protocol(selection);
    let port = resolve_port(selection, protocol, defaults);

    let servers = filter_servers(servers, selection, protocol)?;
    let connections = build_connections(&servers, protocol, port);

    select_connection(&connections, selection.target_ip, rng)
}
