//! Initial port forward negotiation

use super::natpmp::PortMappingGateway;
use super::types::{
    ForwardedPort, PortForwardError, PortMappingGrant, PortMappingRequest, ProtocolError,
};
use crate::logging::Logger;
use crate::servers::TransportProtocol;
use crate::settings::PortForwardSettings;
use std::net::IpAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Obtain a forwarded port from the VPN gateway
///
/// Requests a UDP then a TCP mapping with internal port 0 and external
/// port 0, letting the gateway pick. Lifetime and UDP/TCP port
/// discrepancies are logged through `logger` and never fail the
/// negotiation; the TCP-assigned port is the one returned.
///
/// # Errors
///
/// - `PortForwardError::InvalidGateway` for an unspecified or IPv6 gateway
/// - `PortForwardError::Protocol` when an exchange with the gateway fails
/// - `PortForwardError::Cancelled` when `cancel` fires first
pub async fn negotiate_port_forward(
    cancel: &CancellationToken,
    client: &dyn PortMappingGateway,
    gateway: IpAddr,
    settings: &PortForwardSettings,
    logger: &dyn Logger,
) -> Result<u16, PortForwardError> {
    negotiate_forwarded_port(cancel, client, gateway, settings, logger)
        .await
        .map(|forwarded| forwarded.port)
}

/// Same as [`negotiate_port_forward`], also reporting the granted lease
///
/// Hand the result to the keeper so its first renewal lands before a
/// lease shorter than the refresh interval runs out.
pub async fn negotiate_forwarded_port(
    cancel: &CancellationToken,
    client: &dyn PortMappingGateway,
    gateway: IpAddr,
    settings: &PortForwardSettings,
    logger: &dyn Logger,
) -> Result<ForwardedPort, PortForwardError> {
    validate_gateway(gateway)?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PortForwardError::Cancelled),
        result = negotiate(client, gateway, settings.lifetime(), logger) => result,
    }
}

async fn negotiate(
    client: &dyn PortMappingGateway,
    gateway: IpAddr,
    lifetime: Duration,
    logger: &dyn Logger,
) -> Result<ForwardedPort, PortForwardError> {
    info!("Negotiating port forward with gateway {}", gateway);

    let external = client
        .external_address(gateway)
        .await
        .map_err(|e| PortForwardError::protocol("getting external IPv4 address", e))?;
    logger.info(&format!(
        "gateway external IPv4 address is {}",
        external.address
    ));

    let udp = request_any_port(client, gateway, TransportProtocol::Udp, lifetime)
        .await
        .map_err(|e| PortForwardError::protocol("adding UDP port mapping", e))?;
    check_lifetime(logger, TransportProtocol::Udp, lifetime, udp.lifetime);

    let tcp = request_any_port(client, gateway, TransportProtocol::Tcp, lifetime)
        .await
        .map_err(|e| PortForwardError::protocol("adding TCP port mapping", e))?;
    check_lifetime(logger, TransportProtocol::Tcp, lifetime, tcp.lifetime);

    check_external_ports(logger, udp.external_port, tcp.external_port);

    info!("Port {} forwarded by gateway {}", tcp.external_port, gateway);
    Ok(ForwardedPort {
        port: tcp.external_port,
        lifetime: Some(udp.lifetime.min(tcp.lifetime)),
    })
}

async fn request_any_port(
    client: &dyn PortMappingGateway,
    gateway: IpAddr,
    protocol: TransportProtocol,
    lifetime: Duration,
) -> Result<PortMappingGrant, ProtocolError> {
    let request = PortMappingRequest {
        gateway,
        protocol,
        internal_port: 0,
        requested_external_port: 0,
        requested_lifetime: lifetime,
    };
    let grant = client.add_port_mapping(&request).await?;
    debug!(
        "{} mapping granted: external port {} for {:?}",
        protocol, grant.external_port, grant.lifetime
    );
    Ok(grant)
}

/// Reject gateway addresses no NAT-PMP service can listen on
///
/// NAT-PMP only runs over IPv4.
pub(crate) fn validate_gateway(gateway: IpAddr) -> Result<(), PortForwardError> {
    match gateway {
        IpAddr::V4(v4) if !v4.is_unspecified() => Ok(()),
        _ => Err(PortForwardError::InvalidGateway(gateway)),
    }
}

pub(crate) fn check_lifetime(
    logger: &dyn Logger,
    protocol: TransportProtocol,
    requested: Duration,
    actual: Duration,
) {
    if requested != actual {
        logger.warn(&format!(
            "assigned {} port lifetime {:?} differs from requested lifetime {:?}",
            protocol, actual, requested
        ));
    }
}

fn check_external_ports(logger: &dyn Logger, udp_port: u16, tcp_port: u16) {
    if udp_port != tcp_port {
        logger.warn(&format!(
            "UDP external port {} differs from TCP external port {}",
            udp_port, tcp_port
        ));
    }
}
