//! Torguard provider

use crate::servers::{self, Connection, DefaultPorts, SelectionError, Server, ServerSelection};
use rand::Rng;

/// Torguard serves OpenVPN on 1912 for both transports
pub const TORGUARD_DEFAULT_PORTS: DefaultPorts = DefaultPorts {
    udp: 1912,
    tcp: 1912,
};

/// Torguard servers; no port forwarding
#[derive(Debug, Clone)]
pub struct Torguard {
    servers: Vec<Server>,
}

impl Torguard {
    /// Create the provider over a loaded server catalog
    pub fn new(servers: Vec<Server>) -> Self {
        Self { servers }
    }

    /// Server catalog
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Resolve the tunnel endpoint for `selection`
    pub fn resolve_connection<R: Rng + ?Sized>(
        &self,
        selection: &ServerSelection,
        rng: &mut R,
    ) -> Result<Connection, SelectionError> {
        servers::resolve_connection(&self.servers, selection, TORGUARD_DEFAULT_PORTS, rng)
    }
}
