//! Common types for server selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Transport protocol the tunnel runs over
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// UDP transport (the default)
    Udp,
    /// TCP transport
    Tcp,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => write!(f, "UDP"),
            Self::Tcp => write!(f, "TCP"),
        }
    }
}

/// A VPN server catalog entry
///
/// Catalog entries are loaded elsewhere and handed in read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    /// Server hostname
    pub hostname: String,
    /// Provider-specific server name
    #[serde(default)]
    pub name: Option<String>,
    /// Country the server is located in
    #[serde(default)]
    pub country: String,
    /// Region the server is located in
    #[serde(default)]
    pub region: String,
    /// City the server is located in
    #[serde(default)]
    pub city: String,
    /// Addresses the server answers on, in catalog order
    pub ips: Vec<IpAddr>,
    /// Whether the server accepts TCP tunnels, true when absent
    #[serde(default = "default_true")]
    pub tcp: bool,
    /// Whether the server accepts UDP tunnels, true when absent
    #[serde(default = "default_true")]
    pub udp: bool,
    /// Whether the server supports port forwarding
    #[serde(default)]
    pub port_forward: bool,
}

fn default_true() -> bool {
    true
}

impl Server {
    /// Whether the server accepts tunnels over `protocol`
    pub fn supports(&self, protocol: TransportProtocol) -> bool {
        match protocol {
            TransportProtocol::Udp => self.udp,
            TransportProtocol::Tcp => self.tcp,
        }
    }
}

/// OpenVPN part of a server selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenVpnSelection {
    /// Use TCP instead of UDP
    #[serde(default)]
    pub tcp: bool,
    /// Port overriding the provider default; `None` or `0` means unset
    #[serde(default)]
    pub custom_port: Option<u16>,
}

/// Caller intent for picking a server endpoint
///
/// Built and validated upstream. Empty filter lists impose no constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSelection {
    /// OpenVPN transport options
    #[serde(default)]
    pub openvpn: OpenVpnSelection,
    /// Pin the connection to this exact address
    #[serde(default)]
    pub target_ip: Option<IpAddr>,
    /// Accepted countries
    #[serde(default)]
    pub countries: Vec<String>,
    /// Accepted regions
    #[serde(default)]
    pub regions: Vec<String>,
    /// Accepted cities
    #[serde(default)]
    pub cities: Vec<String>,
    /// Accepted hostnames
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Accepted server names
    #[serde(default)]
    pub names: Vec<String>,
    /// Only keep servers supporting port forwarding
    #[serde(default)]
    pub port_forward_only: bool,
}

/// A dial-able tunnel endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Server address
    pub ip: IpAddr,
    /// Server port
    pub port: u16,
    /// Transport protocol
    pub protocol: TransportProtocol,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{} ({})", ip, self.port, self.protocol),
            IpAddr::V6(ip) => write!(f, "[{}]:{} ({})", ip, self.port, self.protocol),
        }
    }
}

/// Default tunnel ports of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPorts {
    /// Default port for UDP tunnels
    pub udp: u16,
    /// Default port for TCP tunnels
    pub tcp: u16,
}

impl DefaultPorts {
    /// Default port for `protocol`
    pub fn for_protocol(&self, protocol: TransportProtocol) -> u16 {
        match protocol {
            TransportProtocol::Udp => self.udp,
            TransportProtocol::Tcp => self.tcp,
        }
    }
}

/// Errors that can occur while resolving a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// No catalog server matches the selection filters
    #[error("no server found")]
    NoServerFound,

    /// The candidate set is empty
    #[error("no connection to pick from")]
    NoConnection,

    /// The pinned target address is not among the candidates
    #[error("target IP address not found: {0}")]
    TargetIpNotFound(IpAddr),
}
