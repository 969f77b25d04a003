// Shared test doubles: scripted gateway, recording logger, manual clock

use crate::logging::Logger;
use crate::portforward::{
    Clock, ExternalAddress, PortMappingGateway, PortMappingGrant, PortMappingRequest,
    ProtocolError,
};
use crate::servers::Server;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Scripted answer to one mapping request
#[derive(Debug, Clone, Copy)]
pub enum MockResponse {
    Grant {
        external_port: u16,
        lifetime_secs: u64,
        epoch: u32,
    },
    Timeout,
    Hang,
}

pub fn grant(external_port: u16, lifetime_secs: u64, epoch: u32) -> MockResponse {
    MockResponse::Grant {
        external_port,
        lifetime_secs,
        epoch,
    }
}

/// In-memory gateway answering mapping requests from a script
///
/// Once the script is exhausted it grants the requested port (or 4000
/// when the gateway is free to choose) with the requested lifetime.
pub struct MockGateway {
    external: Ipv4Addr,
    script: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<PortMappingRequest>>,
}

impl MockGateway {
    pub fn new(script: Vec<MockResponse>) -> Self {
        Self {
            external: Ipv4Addr::new(203, 0, 113, 7),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<PortMappingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortMappingGateway for MockGateway {
    async fn external_address(&self, _gateway: IpAddr) -> Result<ExternalAddress, ProtocolError> {
        Ok(ExternalAddress {
            epoch: 1,
            address: self.external,
        })
    }

    async fn add_port_mapping(
        &self,
        request: &PortMappingRequest,
    ) -> Result<PortMappingGrant, ProtocolError> {
        self.requests.lock().unwrap().push(*request);
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(MockResponse::Grant {
                external_port,
                lifetime_secs,
                epoch,
            }) => Ok(PortMappingGrant::new(
                epoch,
                request.internal_port,
                external_port,
                Duration::from_secs(lifetime_secs),
            )),
            Some(MockResponse::Timeout) => Err(ProtocolError::Timeout),
            Some(MockResponse::Hang) => std::future::pending().await,
            None => {
                let external_port = match request.requested_external_port {
                    0 => 4000,
                    port => port,
                };
                Ok(PortMappingGrant::new(
                    1,
                    request.internal_port,
                    external_port,
                    request.requested_lifetime,
                ))
            }
        }
    }
}

/// Logger keeping every message for assertions
#[derive(Default)]
pub struct RecordingLogger {
    infos: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

/// Clock that only advances when the test sends a tick
pub struct ManualClock {
    ticks: tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>,
}

impl ManualClock {
    pub fn new() -> (Self, mpsc::UnboundedSender<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                ticks: tokio::sync::Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, _duration: Duration) {
        let mut ticks = self.ticks.lock().await;
        if ticks.recv().await.is_none() {
            // Tick sender gone: time never advances again
            std::future::pending::<()>().await;
        }
    }
}

pub fn gateway_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 2, 0, 1))
}

pub fn server(hostname: &str, country: &str, city: &str, ips: &[&str]) -> Server {
    Server {
        hostname: hostname.to_string(),
        name: None,
        country: country.to_string(),
        region: String::new(),
        city: city.to_string(),
        ips: ips.iter().map(|ip| ip.parse().unwrap()).collect(),
        tcp: true,
        udp: true,
        port_forward: false,
    }
}

/// Small catalog used across selection tests
pub fn sample_catalog() -> Vec<Server> {
    let mut zurich = server(
        "ch-01.example.net",
        "Switzerland",
        "Zurich",
        &["185.159.157.10", "185.159.157.11"],
    );
    zurich.port_forward = true;
    zurich.name = Some("CH#1".to_string());

    let mut frankfurt = server("de-01.example.net", "Germany", "Frankfurt", &["194.126.177.5"]);
    frankfurt.tcp = false;

    let mut toronto = server(
        "ca-01.example.net",
        "Canada",
        "Toronto",
        &["37.120.205.20", "37.120.205.21", "2a07:b944::2:1"],
    );
    toronto.region = "Ontario".to_string();
    toronto.port_forward = true;

    vec![zurich, frankfurt, toronto]
}
