//! VPN provider capability
//!
//! Each supported provider is one variant of `Provider`. The tunnel
//! orchestrator only talks to this enum: it resolves the endpoint to dial
//! and, for providers that support it, negotiates and keeps a forwarded
//! port.
//!
//! # Example
//!
//! ```no_run
//! use tunnelgate::provider::{Provider, ProtonVpn};
//! use tunnelgate::portforward::NatPmpClient;
//! use tunnelgate::{ServerSelection, TracingLogger};
//! use rand::SeedableRng;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(servers: Vec<tunnelgate::Server>) -> tunnelgate::Result<()> {
//! let provider = Provider::ProtonVpn(ProtonVpn::new(servers));
//! let mut rng = rand::rngs::StdRng::from_entropy();
//! let connection = provider.resolve_connection(&ServerSelection::default(), &mut rng)?;
//! println!("Dialing {}", connection);
//!
//! let cancel = CancellationToken::new();
//! let client = NatPmpClient::new();
//! let gateway = "10.2.0.1".parse().expect("valid address");
//! let forwarded = provider
//!     .negotiate_forwarded_port(&cancel, &client, gateway, &TracingLogger)
//!     .await?;
//! provider
//!     .keep_forwarded_port(&cancel, &client, forwarded, gateway, &TracingLogger)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod protonvpn;
pub mod torguard;

pub use protonvpn::{PROTONVPN_DEFAULT_PORTS, ProtonVpn};
pub use torguard::{TORGUARD_DEFAULT_PORTS, Torguard};

use crate::logging::Logger;
use crate::portforward::{ForwardedPort, KeeperStopped, PortMappingGateway};
use crate::servers::{Connection, ServerSelection};
use crate::{Error, Result};
use rand::Rng;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A VPN provider
#[derive(Debug, Clone)]
pub enum Provider {
    /// ProtonVPN
    ProtonVpn(ProtonVpn),
    /// Torguard
    Torguard(Torguard),
}

impl Provider {
    /// Provider display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProtonVpn(_) => "ProtonVPN",
            Self::Torguard(_) => "Torguard",
        }
    }

    /// Whether the provider can forward a port
    pub fn supports_port_forward(&self) -> bool {
        matches!(self, Self::ProtonVpn(_))
    }

    /// Resolve the tunnel endpoint for `selection`
    ///
    /// `rng` is only used when no target IP is pinned.
    pub fn resolve_connection<R: Rng + ?Sized>(
        &self,
        selection: &ServerSelection,
        rng: &mut R,
    ) -> Result<Connection> {
        let connection = match self {
            Self::ProtonVpn(provider) => provider.resolve_connection(selection, rng)?,
            Self::Torguard(provider) => provider.resolve_connection(selection, rng)?,
        };
        info!("{} connection resolved to {}", self.name(), connection);
        Ok(connection)
    }

    /// Obtain a forwarded port from `gateway`
    pub async fn negotiate_port_forward(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<u16> {
        match self {
            Self::ProtonVpn(provider) => Ok(provider
                .negotiate_port_forward(cancel, client, gateway, logger)
                .await?),
            Self::Torguard(_) => Err(Error::PortForwardNotSupported(self.name())),
        }
    }

    /// Obtain a forwarded port and the lease it was granted for
    pub async fn negotiate_forwarded_port(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<ForwardedPort> {
        match self {
            Self::ProtonVpn(provider) => Ok(provider
                .negotiate_forwarded_port(cancel, client, gateway, logger)
                .await?),
            Self::Torguard(_) => Err(Error::PortForwardNotSupported(self.name())),
        }
    }

    /// Keep `port` forwarded until `cancel` fires or a renewal fails
    ///
    /// Blocks for the whole session; cancellation yields `Ok(KeeperStopped)`.
    pub async fn keep_port_forward(
        &self,
        cancel: &CancellationToken,
        client: &dyn PortMappingGateway,
        port: u16,
        gateway: IpAddr,
        logger: &dyn Logger,
    ) -> Result<KeeperStopped> {
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
    ) -> Result<KeeperStopped> {
        match self {
            Self::ProtonVpn(provider) => Ok(provider
                .keep_forwarded_port(cancel, client, forwarded, gateway, logger)
                .await?),
            Self::Torguard(_) => Err(Error::PortForwardNotSupported(self.name())),
        }
    }
}
