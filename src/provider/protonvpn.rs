//! ProtonVPN provider
//!
//! ProtonVPN forwards a port through NAT-PMP on the gateway inside the
//! tunnel.

use crate::logging::Logger;
use crate::portforward::{
    self, ForwardedPort, KeeperStopped, PortForwardError, PortMappingGateway,
};
use crate::servers::{self, Connection, DefaultPorts, SelectionError, Server, ServerSelection};
use crate::settings::PortForwardSettings;
use rand::Rng;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;

/// ProtonVPN OpenVPN ports
pub const PROTONVPN_DEFAULT_PORTS: DefaultPorts = DefaultPorts {
    udp: 1194,
    tcp: 443,
};

/// ProtonVPN servers and port forwarding
#[derive(Debug, Clone)]
pub struct ProtonVpn {
    servers: Vec<Server>,
    port_forward: PortForwardSettings,
}

impl ProtonVpn {
    /// Create the provider over a loaded server catalog
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            servers,
            port_forward: PortForwardSettings::default(),
        }
    }

    /// Use custom port forwarding settings
    pub fn with_port_forward_settings(mut self, settings: PortForwardSettings) -> Self {
        self.port_forward = settings;
        self
    }

    /// Server catalog
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Port forwarding settings
    pub fn port_forward_settings(&self) -> &PortForwardSettings {
        &self.port_forward
    }

    /// Resolve the tunnel endpoint for `selection`
    pub fn resolve_connection<R: Rng + ?Sized>(
        &self,
        selection: &ServerSelection,
        rng: &mut R,
    ) -> Result<Connection, SelectionError> {
        servers::resolve_connection(&self.servers, selection, PROTONVPN_DEFAULT_PORTS, rng)
    }

    /// Obtain a forwarded port from `gateway`
    pub async fn negotiate_port_forward(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<u16, PortForwardError> {
        portforward::negotiate_port_forward(cancel, client, gateway, &self.port_forward, logger)
            .await
    }

    /// Obtain a forwarded port and the lease it was granted for
    pub async fn negotiate_forwarded_port(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<ForwardedPort, PortForwardError> {
        portforward::negotiate_forwarded_port(cancel, client, gateway, &self.port_forward, logger)
            .await
    }

    /// Keep `port` forwarded until `cancel` fires or a renewal fails
    pub async fn keep_port_forward(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        port: u16,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<KeeperStopped, PortForwardError> {
        self.keep_forwarded_port(cancel, client, ForwardedPort::from(port), gateway, logger)
            .await
    }

    /// Keep a negotiated port forwarded, renewing before its lease runs out
    pub async fn keep_forwarded_port(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        forwarded: ForwardedPort,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<KeeperStopped, PortForwardError> {
        let settings = &self.port_forward;
        portforward::keep_forwarded_port(cancel, client, gateway, forwarded, settings, logger).await
    }
}
