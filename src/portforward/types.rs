//! Common types for port forwarding

use super::natpmp::NatPmpResultCode;
use crate::servers::TransportProtocol;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// A port mapping request sent to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMappingRequest {
    /// Gateway running the NAT-PMP service
    pub gateway: IpAddr,
    /// Protocol to map
    pub protocol: TransportProtocol,
    /// Internal port (0 = any)
    pub internal_port: u16,
    /// Suggested external port (0 = gateway's choice)
    pub requested_external_port: u16,
    /// Requested mapping lifetime
    pub requested_lifetime: Duration,
}

/// The gateway's authoritative answer to a mapping request
///
/// Port and lifetime may differ from what was requested. The mapping is
/// only valid for `lifetime` after `granted_at_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortMappingGrant {
    /// Gateway epoch at grant time
    pub epoch: u32,
    /// Internal port echoed by the gateway
    pub internal_port: u16,
    /// Assigned external port
    pub external_port: u16,
    /// Assigned lifetime
    pub lifetime: Duration,
    /// Timestamp when the grant was received (Unix milliseconds)
    pub granted_at_ms: i64,
}

impl PortMappingGrant {
    /// Build a grant received now
    pub fn new(epoch: u32, internal_port: u16, external_port: u16, lifetime: Duration) -> Self {
        Self {
            epoch,
            internal_port,
            external_port,
            lifetime,
            granted_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Unix milliseconds after which the gateway drops the mapping
    pub fn expires_at_ms(&self) -> i64 {
        let lifetime_ms = i64::try_from(self.lifetime.as_millis()).unwrap_or(i64::MAX);
        self.granted_at_ms.saturating_add(lifetime_ms)
    }

    /// Whether the mapping has expired at `now_ms`
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms()
    }
}

/// External address reported by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalAddress {
    /// Gateway epoch
    pub epoch: u32,
    /// Public IPv4 address of the gateway
    pub address: Ipv4Addr,
}

/// Whether the gateway restarted between two observed epochs
///
/// Epochs only grow while the gateway is up; a smaller value means every
/// earlier mapping is gone and must be requested again.
pub fn gateway_restarted(previous: u32, current: u32) -> bool {
    current < previous
}

/// Errors from a single NAT-PMP exchange
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No response before the request timeout
    #[error("request timed out")]
    Timeout,

    /// Malformed or unexpected response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Gateway answered with a failure result code
    #[error("gateway error: {}", .0.to_error_message())]
    Gateway(NatPmpResultCode),

    /// IO error during communication
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while negotiating or keeping a forwarded port
#[derive(Debug, Error)]
pub enum PortForwardError {
    /// Gateway address is unusable: unspecified or not IPv4
    #[error("gateway IP address is not valid: {0}")]
    InvalidGateway(IpAddr),

    /// A protocol exchange failed
    #[error("{context}: {source}")]
    Protocol {
        /// Step that failed
        context: &'static str,
        /// Underlying protocol error
        #[source]
        source: ProtocolError,
    },

    /// Negotiation was cancelled before completing
    #[error("port forwarding negotiation cancelled")]
    Cancelled,
}

impl PortForwardError {
    /// Wrap a protocol error with the step that produced it
    pub fn protocol(context: &'static str, source: ProtocolError) -> Self {
        Self::Protocol { context, source }
    }

    /// Whether the operation stopped because its token was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Port obtained from the gateway, with the lease it was granted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardedPort {
    /// External port forwarded for both UDP and TCP
    pub port: u16,
    /// Shortest lifetime granted, when known
    pub lifetime: Option<Duration>,
}

impl From<u16> for ForwardedPort {
    fn from(port: u16) -> Self {
        Self {
            port,
            lifetime: None,
        }
    }
}
