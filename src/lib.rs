//! Tunnelgate - VPN endpoint selection and port forwarding
//!
//! This library provides the core of a VPN client gateway: picking the
//! server endpoint a tunnel dials, and negotiating then maintaining a
//! forwarded external port with the VPN gateway over NAT-PMP.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod logging;
pub mod portforward;
pub mod provider;
pub mod servers;
pub mod settings;

pub use logging::{Logger, TracingLogger};
pub use portforward::{PortForwardError, ProtocolError};
pub use provider::Provider;
pub use servers::{Connection, SelectionError, Server, ServerSelection, TransportProtocol};
pub use settings::PortForwardSettings;

use tracing_subscriber::EnvFilter;

/// Result type alias for Tunnelgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Tunnelgate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable endpoint could be selected
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Port forwarding negotiation or renewal failed
    #[error("Port forwarding error: {0}")]
    PortForward(#[from] PortForwardError),

    /// The provider has no port forwarding capability
    #[error("Port forwarding is not supported by {0}")]
    PortForwardNotSupported(&'static str),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a port forwarding operation stopped through cancellation
    ///
    /// Cancellation is a normal way to end a session, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::PortForward(e) if e.is_cancelled())
    }
}

/// Initialize logging for the library
///
/// Honors `RUST_LOG` and falls back to the `info` level.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests;
