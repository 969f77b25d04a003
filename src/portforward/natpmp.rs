//! NAT-PMP (NAT Port Mapping Protocol) client - RFC 6886
//!
//! NAT-PMP runs over UDP on port 5351 of the gateway. This client supports
//! the two operations port forwarding needs:
//! - External address requests
//! - UDP and TCP port mapping requests
//!
//! Every call binds its own socket, waits at most the configured timeout and
//! never retries; retry policy belongs to the caller.
//!
//! # Example
//!
//! ```no_run
//! use tunnelgate::portforward::{NatPmpClient, PortMappingGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NatPmpClient::new();
//! let external = client.external_address("10.2.0.1".parse()?).await?;
//! println!("External address: {} (epoch {})", external.address, external.epoch);
//! # Ok(())
//! # }
//! ```

use super::types::{ExternalAddress, PortMappingGrant, PortMappingRequest, ProtocolError};
use crate::servers::TransportProtocol;
use crate::settings::PortForwardSettings;
use async_trait::async_trait;
use bytes::{Buf, BufMut};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// NAT-PMP server port (IANA assigned)
pub const NATPMP_SERVER_PORT: u16 = 5351;

/// NAT-PMP protocol version
pub(crate) const NATPMP_VERSION: u8 = 0;

/// Default timeout for NAT-PMP requests
pub const NATPMP_TIMEOUT: Duration = Duration::from_secs(2);

/// Offset added to the request opcode in responses
const RESPONSE_OPCODE_OFFSET: u8 = 128;

const EXTERNAL_ADDRESS_RESPONSE_LEN: usize = 12;
const MAP_REQUEST_LEN: usize = 12;
const MAP_RESPONSE_LEN: usize = 16;

/// NAT-PMP opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum NatPmpOpcode {
    /// External address request
    ExternalAddress = 0,
    /// UDP port mapping
    MapUdp = 1,
    /// TCP port mapping
    MapTcp = 2,
}

impl NatPmpOpcode {
    pub(crate) fn for_protocol(protocol: TransportProtocol) -> Self {
        match protocol {
            TransportProtocol::Udp => Self::MapUdp,
            TransportProtocol::Tcp => Self::MapTcp,
        }
    }

    fn response(self) -> u8 {
        RESPONSE_OPCODE_OFFSET + self as u8
    }
}

/// NAT-PMP result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NatPmpResultCode {
    /// Request succeeded
    Success = 0,
    /// Gateway speaks another protocol version
    UnsupportedVersion = 1,
    /// Gateway refused the request
    NotAuthorized = 2,
    /// Gateway has no external connectivity
    NetworkFailure = 3,
    /// Gateway cannot create more mappings
    OutOfResources = 4,
    /// Gateway does not know the opcode
    UnsupportedOpcode = 5,
}

impl NatPmpResultCode {
    pub(crate) fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::UnsupportedVersion),
            2 => Some(Self::NotAuthorized),
            3 => Some(Self::NetworkFailure),
            4 => Some(Self::OutOfResources),
            5 => Some(Self::UnsupportedOpcode),
            _ => None,
        }
    }

    pub(crate) fn to_error_message(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::UnsupportedVersion => "Unsupported NAT-PMP version",
            Self::NotAuthorized => "Not authorized/refused",
            Self::NetworkFailure => "Network failure",
            Self::OutOfResources => "Out of resources",
            Self::UnsupportedOpcode => "Unsupported opcode",
        }
    }
}

/// Gateway side of port forwarding
///
/// Implemented by `NatPmpClient` against a real gateway; tests substitute
/// scripted gateways.
#[async_trait]
pub trait PortMappingGateway: Send + Sync {
    /// Query the gateway's external IPv4 address and epoch
    async fn external_address(&self, gateway: IpAddr) -> Result<ExternalAddress, ProtocolError>;

    /// Request a mapping and return exactly what the gateway granted
    async fn add_port_mapping(
        &self,
        request: &PortMappingRequest,
    ) -> Result<PortMappingGrant, ProtocolError>;
}

/// NAT-PMP client talking to a gateway over UDP
#[derive(Debug, Clone)]
pub struct NatPmpClient {
    server_port: u16,
    timeout: Duration,
}

impl NatPmpClient {
    /// Create a client for the standard NAT-PMP port and timeout
    pub fn new() -> Self {
        Self {
            server_port: NATPMP_SERVER_PORT,
            timeout: NATPMP_TIMEOUT,
        }
    }

    /// Create a client from port forwarding settings
    pub fn from_settings(settings: &PortForwardSettings) -> Self {
        Self {
            server_port: settings.gateway_port,
            timeout: settings.request_timeout(),
        }
    }

    /// Use another gateway port
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    /// Use another per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `request` and receive a single datagram into `response_buf`
    async fn exchange(
        &self,
        gateway: IpAddr,
        request: &[u8],
        response_buf: &mut [u8],
    ) -> Result<usize, ProtocolError> {
        let IpAddr::V4(gateway) = gateway else {
            return Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("NAT-PMP gateway must be an IPv4 address, got {}", gateway),
            )));
        };
        let server_addr = SocketAddr::from((gateway, self.server_port));
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));

        let round_trip = async {
            let socket = UdpSocket::bind(bind_addr).await?;
            // Connected sockets drop datagrams from other sources
            socket.connect(server_addr).await?;
            socket.send(request).await?;
            debug!("Sent {} byte NAT-PMP request to {}", request.len(), server_addr);

            let bytes_received = socket.recv(response_buf).await?;
            debug!("Received {} bytes from NAT-PMP server", bytes_received);
            Ok::<usize, std::io::Error>(bytes_received)
        };

        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProtocolError::Timeout),
        }
    }
}

impl Default for NatPmpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortMappingGateway for NatPmpClient {
    async fn external_address(&self, gateway: IpAddr) -> Result<ExternalAddress, ProtocolError> {
        let request = build_natpmp_external_address_request();
        let mut response_buf = [0u8; EXTERNAL_ADDRESS_RESPONSE_LEN];
        let received = self.exchange(gateway, &request, &mut response_buf).await?;
        parse_natpmp_external_address_response(&response_buf[..received])
    }

    async fn add_port_mapping(
        &self,
        request: &PortMappingRequest,
    ) -> Result<PortMappingGrant, ProtocolError> {
        let lifetime_secs = lifetime_to_secs(request.requested_lifetime);
        let packet = build_natpmp_map_request(
            request.internal_port,
            request.requested_external_port,
            lifetime_secs,
            request.protocol,
        );

        let mut response_buf = [0u8; MAP_RESPONSE_LEN];
        let received = self
            .exchange(request.gateway, &packet, &mut response_buf)
            .await?;
        parse_natpmp_map_response(&response_buf[..received], request.protocol)
    }
}

/// Lifetime in whole seconds, saturating at the wire maximum
pub(crate) fn lifetime_to_secs(lifetime: Duration) -> u32 {
    u32::try_from(lifetime.as_secs()).unwrap_or(u32::MAX)
}

/// Build a NAT-PMP external address request packet
pub(crate) fn build_natpmp_external_address_request() -> Vec<u8> {
    vec![NATPMP_VERSION, NatPmpOpcode::ExternalAddress as u8]
}

/// Build a NAT-PMP MAP request packet
pub(crate) fn build_natpmp_map_request(
    internal_port: u16,
    suggested_external_port: u16,
    lifetime_secs: u32,
    protocol: TransportProtocol,
) -> Vec<u8> {
    let mut request = Vec::with_capacity(MAP_REQUEST_LEN);

    request.put_u8(NATPMP_VERSION);
    request.put_u8(NatPmpOpcode::for_protocol(protocol) as u8);
    // Reserved, must be zero
    request.put_u16(0);
    request.put_u16(internal_port);
    request.put_u16(suggested_external_port);
    request.put_u32(lifetime_secs);

    request
}

/// Validate the common response header and return the epoch
///
/// Header layout: version(1) | opcode(1) | result_code(2) | epoch(4).
fn parse_response_header(
    response: &mut &[u8],
    expected_len: usize,
    opcode: NatPmpOpcode,
) -> Result<u32, ProtocolError> {
    if response.len() < 4 {
        return Err(ProtocolError::InvalidResponse(format!(
            "Response too short: {} bytes (expected {})",
            response.len(),
            expected_len
        )));
    }

    let version = response.get_u8();
    if version != NATPMP_VERSION {
        return Err(ProtocolError::InvalidResponse(format!(
            "Invalid version: {} (expected {})",
            version, NATPMP_VERSION
        )));
    }

    let response_opcode = response.get_u8();
    if response_opcode != opcode.response() {
        return Err(ProtocolError::InvalidResponse(format!(
            "Unexpected opcode: {} (expected {})",
            response_opcode,
            opcode.response()
        )));
    }

    let result_code = response.get_u16();
    let result = NatPmpResultCode::from_u16(result_code).ok_or_else(|| {
        ProtocolError::InvalidResponse(format!("Unknown result code: {}", result_code))
    })?;
    if result != NatPmpResultCode::Success {
        return Err(ProtocolError::Gateway(result));
    }

    // 4 header bytes already consumed
    if response.len() + 4 < expected_len {
        return Err(ProtocolError::InvalidResponse(format!(
            "Response too short: {} bytes (expected {})",
            response.len() + 4,
            expected_len
        )));
    }

    Ok(response.get_u32())
}

/// Parse a NAT-PMP external address response packet
pub(crate) fn parse_natpmp_external_address_response(
    response: &[u8],
) -> Result<ExternalAddress, ProtocolError> {
    let mut buf = response;
    let epoch = parse_response_header(
        &mut buf,
        EXTERNAL_ADDRESS_RESPONSE_LEN,
        NatPmpOpcode::ExternalAddress,
    )?;

    let address = Ipv4Addr::from(buf.get_u32());

    Ok(ExternalAddress { epoch, address })
}

/// Parse a NAT-PMP MAP response packet
pub(crate) fn parse_natpmp_map_response(
    response: &[u8],
    protocol: TransportProtocol,
) -> Result<PortMappingGrant, ProtocolError> {
    let mut buf = response;
    let epoch = parse_response_header(
        &mut buf,
        MAP_RESPONSE_LEN,
        NatPmpOpcode::for_protocol(protocol),
    )
    .map_err(|e| match e {
        ProtocolError::InvalidResponse(reason) => ProtocolError::InvalidResponse(format!(
            "{} (packet {})",
            reason,
            hex::encode(response)
        )),
        other => other,
    })?;

    let internal_port = buf.get_u16();
    let external_port = buf.get_u16();
    let lifetime_secs = buf.get_u32();

    Ok(PortMappingGrant::new(
        epoch,
        internal_port,
        external_port,
        Duration::from_secs(u64::from(lifetime_secs)),
    ))
}
