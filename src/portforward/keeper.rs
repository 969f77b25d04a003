//! Forwarded port renewal
//!
//! The keeper re-requests the UDP and TCP mappings before they expire,
//! asking the gateway to keep the held port. It follows the gateway when a
//! different port is assigned and publishes the new port to subscribers.

use super::natpmp::PortMappingGateway;
use super::negotiator::{check_lifetime, validate_gateway};
use super::types::{ForwardedPort, PortForwardError, PortMappingRequest, gateway_restarted};
use crate::logging::Logger;
use crate::servers::TransportProtocol;
use crate::settings::PortForwardSettings;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest wait between renewals when the gateway grants tiny leases
const MIN_RENEWAL_WAIT: Duration = Duration::from_secs(1);

/// Source of the renewal timer
#[async_trait]
pub trait Clock: Send + Sync {
    /// Complete after `duration` has elapsed on this clock
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returned when the keeper exits through cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperStopped;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeeperPhase {
    Waiting,
    Renewing,
    Stopped,
}

/// State of the forwarded port, mutated only by the keeper loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedPortState {
    /// External port currently held
    pub port: u16,
    /// Shortest lifetime granted by the gateway so far
    pub lifetime: Option<Duration>,
    /// Instant the mappings expire without renewal
    pub renew_by: Option<Instant>,
    /// Last epoch reported by the gateway
    pub epoch: Option<u32>,
}

impl ForwardedPortState {
    fn new(port: u16) -> Self {
        Self {
            port,
            lifetime: None,
            renew_by: None,
            epoch: None,
        }
    }
}

/// Long-running renewal loop for a forwarded port
///
/// # Example
///
/// ```no_run
/// use tunnelgate::portforward::{NatPmpClient, PortForwardKeeper, TokioClock};
/// use tunnelgate::{PortForwardSettings, TracingLogger};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = NatPmpClient::new();
/// let cancel = CancellationToken::new();
/// let keeper = PortForwardKeeper::new(
///     &client,
///     TokioClock,
///     "10.2.0.1".parse()?,
///     40000,
///     PortForwardSettings::default(),
///     &TracingLogger,
/// );
/// let mut port = keeper.subscribe();
/// tokio::spawn(async move {
///     while port.changed().await.is_ok() {
///         println!("forwarded port is now {}", *port.borrow());
///     }
/// });
/// keeper.run(&cancel).await?;
/// # Ok(())
/// # }
/// ```
pub struct PortForwardKeeper<'a, C> {
    client: &'a dyn PortMappingGateway,
    clock: C,
    gateway: IpAddr,
    settings: PortForwardSettings,
    logger: &'a dyn Logger,
    state: ForwardedPortState,
    port_tx: watch::Sender<u16>,
}

impl<'a, C: Clock> PortForwardKeeper<'a, C> {
    /// Create a keeper for `port`, previously negotiated with `gateway`
    pub fn new(
        client: &'a dyn PortMappingGateway,
        clock: C,
        gateway: IpAddr,
        port: u16,
        settings: PortForwardSettings,
        logger: &'a dyn Logger,
    ) -> Self {
        let (port_tx, _) = watch::channel(port);
        Self {
            client,
            clock,
            gateway,
            settings,
            logger,
            state: ForwardedPortState::new(port),
            port_tx,
        }
    }

    /// Start from the lease granted at negotiation
    ///
    /// Without it the first wait assumes the requested lifetime was granted.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.state.lifetime = Some(lifetime);
        self
    }

    /// Watch the held port; a new value is published on every change
    pub fn subscribe(&self) -> watch::Receiver<u16> {
        self.port_tx.subscribe()
    }

    /// Current state of the forwarded port
    pub fn state(&self) -> &ForwardedPortState {
        &self.state
    }

    /// Renew until `cancel` fires or a renewal fails
    ///
    /// Cancellation is observed while waiting and during a renewal, and
    /// returns `Ok(KeeperStopped)` without a final renewal.
    ///
    /// # Errors
    ///
    /// Returns the first renewal failure, or `InvalidGateway` for an
    /// unspecified or IPv6 gateway address.
    pub async fn run(
        mut self,
        cancel: &CancellationToken,
    ) -> Result<KeeperStopped, PortForwardError> {
        validate_gateway(self.gateway)?;
        info!(
            "Keeping port {} forwarded with gateway {}",
            self.state.port, self.gateway
        );

        let mut phase = KeeperPhase::Waiting;
        loop {
            phase = match phase {
                KeeperPhase::Waiting => {
                    let wait = self.next_wait();
                    debug!("Next renewal in {:?}", wait);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => KeeperPhase::Stopped,
                        _ = self.clock.sleep(wait) => KeeperPhase::Renewing,
                    }
                }
                KeeperPhase::Renewing => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => KeeperPhase::Stopped,
                        result = self.renew() => {
                            result?;
                            KeeperPhase::Waiting
                        }
                    }
                }
                KeeperPhase::Stopped => {
                    info!("Stopped keeping port {} forwarded", self.state.port);
                    return Ok(KeeperStopped);
                }
            };
        }
    }

    /// Wait before the next renewal, always shorter than the granted lifetime
    fn next_wait(&self) -> Duration {
        let interval = self.settings.refresh_interval();
        let lifetime = self.state.lifetime.unwrap_or_else(|| self.settings.lifetime());
        if lifetime <= interval {
            (lifetime / 2).max(MIN_RENEWAL_WAIT)
        } else {
            interval
        }
    }

    async fn renew(&mut self) -> Result<(), PortForwardError> {
        let lifetime = self.settings.lifetime();
        let mut shortest_lifetime = lifetime;

        for protocol in [TransportProtocol::Udp, TransportProtocol::Tcp] {
            let request = PortMappingRequest {
                gateway: self.gateway,
                protocol,
                internal_port: 0,
                requested_external_port: self.state.port,
                requested_lifetime: lifetime,
            };

            let grant = self
                .client
                .add_port_mapping(&request)
                .await
                .map_err(|e| PortForwardError::protocol("adding port mapping", e))?;

            self.observe_epoch(grant.epoch);
            check_lifetime(self.logger, protocol, lifetime, grant.lifetime);
            shortest_lifetime = shortest_lifetime.min(grant.lifetime);

            if grant.external_port != self.state.port {
                self.logger.warn(&format!(
                    "external port assigned {} changed to {}",
                    self.state.port, grant.external_port
                ));
                self.state.port = grant.external_port;
                self.port_tx.send_replace(grant.external_port);
            }
        }

        self.state.lifetime = Some(shortest_lifetime);
        self.state.renew_by = Some(Instant::now() + shortest_lifetime);
        debug!(
            "Port {} renewed for {:?}",
            self.state.port, shortest_lifetime
        );

        Ok(())
    }

    fn observe_epoch(&mut self, epoch: u32) {
        if let Some(previous) = self.state.epoch {
            if gateway_restarted(previous, epoch) {
                self.logger.warn(&format!(
                    "gateway epoch went back from {} to {}: gateway restarted, mappings renewed from scratch",
                    previous, epoch
                ));
            }
        }
        self.state.epoch = Some(epoch);
    }
}

/// Keep `port` forwarded on the tokio timer until `cancel` fires
///
/// The first wait assumes the requested lifetime was granted. Prefer
/// [`keep_forwarded_port`] right after negotiation.
pub async fn keep_port_forward(
    cancel: &CancellationToken,
    client: &dyn PortMappingGateway,
    gateway: IpAddr,
    port: u16,
    settings: &PortForwardSettings,
    logger: &dyn Logger,
) -> Result<KeeperStopped, PortForwardError> {
    keep_forwarded_port(cancel, client, gateway, ForwardedPort::from(port), settings, logger).await
}

/// Keep a negotiated port forwarded, timing the first renewal on its lease
pub async fn keep_forwarded_port(
    cancel: &CancellationToken,
    client: &dyn PortMappingGateway,
    gateway: IpAddr,
    forwarded: ForwardedPort,
    settings: &PortForwardSettings,
    logger: &dyn Logger,
) -> Result<KeeperStopped, PortForwardError> {
    let settings = settings.clone();
    let mut keeper =
        PortForwardKeeper::new(client, TokioClock, gateway, forwarded.port, settings, logger);
    if let Some(lifetime) = forwarded.lifetime {
        keeper = keeper.with_lifetime(lifetime);
    }
    keeper.run(cancel).await
}
