//! Candidate connection building

use super::types::{Connection, DefaultPorts, Server, ServerSelection, TransportProtocol};

/// Transport protocol requested by the selection (TCP only when asked for)
pub fn resolve_protocol(selection: &ServerSelection) -> TransportProtocol {
    if selection.openvpn.tcp {
        TransportProtocol::Tcp
    } else {
        TransportProtocol::Udp
    }
}

/// Port to dial: the custom port when set and non-zero, else the provider default
pub fn resolve_port(
    selection: &ServerSelection,
    protocol: TransportProtocol,
    defaults: DefaultPorts,
) -> u16 {
    match selection.openvpn.custom_port {
        Some(port) if port > 0 => port,
        _ => defaults.for_protocol(protocol),
    }
}

/// Expand servers into one connection per (server, address) pair
///
/// Order follows the servers, then each server's addresses.
pub fn build_connections(
    servers: &[Server],
    protocol: TransportProtocol,
    port: u16,
) -> Vec<Connection> {
    servers
        .iter()
        .flat_map(|server| server.ips.iter())
        .map(|&ip| Connection { ip, port, protocol })
        .collect()
}
