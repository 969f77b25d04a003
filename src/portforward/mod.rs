//! Port forwarding with the VPN gateway over NAT-PMP (RFC 6886)
//!
//! Forwarding happens in two stages:
//! - negotiation obtains the initial external port once the tunnel is up
//! - the keeper renews the UDP and TCP mappings for the session lifetime
//!
//! Gateways may grant another port or a shorter lifetime than requested;
//! both are logged and absorbed, never treated as errors.

// Submodules
pub mod keeper;
pub mod natpmp;
pub mod negotiator;
pub mod types;

// Re-export commonly used types
pub use types::{
    ExternalAddress, ForwardedPort, PortForwardError, PortMappingGrant, PortMappingRequest,
    ProtocolError, gateway_restarted,
};

// Re-export main functions
pub use keeper::{
    Clock, ForwardedPortState, KeeperStopped, PortForwardKeeper, TokioClock, keep_forwarded_port,
    keep_port_forward,
};
pub use natpmp::{NatPmpClient, NatPmpResultCode, PortMappingGateway};
pub use negotiator::{negotiate_forwarded_port, negotiate_port_forward};
