use super::helpers::{MockGateway, RecordingLogger, gateway_ip, grant, sample_catalog};
use crate::Error;
use crate::portforward::KeeperStopped;
use crate::provider::{PROTONVPN_DEFAULT_PORTS, ProtonVpn, Provider, TORGUARD_DEFAULT_PORTS, Torguard};
use crate::servers::{OpenVpnSelection, SelectionError, ServerSelection, TransportProtocol};
use crate::settings::PortForwardSettings;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn test_provider_default_ports() {
    assert_eq!(TORGUARD_DEFAULT_PORTS.for_protocol(TransportProtocol::Udp), 1912);
    assert_eq!(TORGUARD_DEFAULT_PORTS.for_protocol(TransportProtocol::Tcp), 1912);
    assert_eq!(PROTONVPN_DEFAULT_PORTS.for_protocol(TransportProtocol::Udp), 1194);
    assert_eq!(PROTONVPN_DEFAULT_PORTS.for_protocol(TransportProtocol::Tcp), 443);
}

#[test]
fn test_torguard_resolves_on_default_port() {
    let provider = Provider::Torguard(Torguard::new(sample_catalog()));
    let mut rng = StdRng::seed_from_u64(1);

    let connection = provider
        .resolve_connection(&ServerSelection::default(), &mut rng)
        .unwrap();

    assert_eq!(connection.port, 1912);
    assert_eq!(connection.protocol, TransportProtocol::Udp);
}

#[test]
fn test_protonvpn_resolves_tcp_on_443() {
    let provider = Provider::ProtonVpn(ProtonVpn::new(sample_catalog()));
    let selection = ServerSelection {
        openvpn: OpenVpnSelection {
            tcp: true,
            custom_port: None,
        },
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(5);

    let connection = provider.resolve_connection(&selection, &mut rng).unwrap();

    assert_eq!(connection.port, 443);
    assert_eq!(connection.protocol, TransportProtocol::Tcp);
}

#[test]
fn test_provider_selection_errors_surface() {
    let provider = Provider::ProtonVpn(ProtonVpn::new(sample_catalog()));
    let target = "198.51.100.1".parse().unwrap();
    let selection = ServerSelection {
        target_ip: Some(target),
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(0);

    let result = provider.resolve_connection(&selection, &mut rng);
    assert!(matches!(
        result,
        Err(Error::Selection(SelectionError::TargetIpNotFound(ip))) if ip == target
    ));

    let empty = Provider::Torguard(Torguard::new(Vec::new()));
    let result = empty.resolve_connection(&ServerSelection::default(), &mut rng);
    assert!(matches!(
        result,
        Err(Error::Selection(SelectionError::NoServerFound))
    ));
}

#[test]
fn test_provider_names_and_capabilities() {
    let proton = Provider::ProtonVpn(ProtonVpn::new(Vec::new()));
    let torguard = Provider::Torguard(Torguard::new(Vec::new()));

    assert_eq!(proton.name(), "ProtonVPN");
    assert_eq!(torguard.name(), "Torguard");
    assert!(proton.supports_port_forward());
    assert!(!torguard.supports_port_forward());
}

#[tokio::test]
async fn test_torguard_rejects_port_forwarding() {
    let provider = Provider::Torguard(Torguard::new(sample_catalog()));
    let gateway = MockGateway::echo();
    let logger = RecordingLogger::default();
    let cancel = CancellationToken::new();

    let result = provider
        .negotiate_port_forward(&cancel, &gateway, gateway_ip(), &logger)
        .await;
    assert!(matches!(result, Err(Error::PortForwardNotSupported("Torguard"))));

    let result = provider
        .keep_port_forward(&cancel, &gateway, 4000, gateway_ip(), &logger)
        .await;
    assert!(matches!(result, Err(Error::PortForwardNotSupported(_))));
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn test_protonvpn_negotiates_then_keeps_port() {
    let provider = Provider::ProtonVpn(ProtonVpn::new(sample_catalog()));
    let gateway = MockGateway::new(vec![grant(4000, 60, 1), grant(4000, 60, 1)]);
    let logger = RecordingLogger::default();
    let cancel = CancellationToken::new();

    let port = provider
        .negotiate_port_forward(&cancel, &gateway, gateway_ip(), &logger)
        .await
        .unwrap();
    assert_eq!(port, 4000);

    cancel.cancel();
    let stopped = provider
        .keep_port_forward(&cancel, &gateway, port, gateway_ip(), &logger)
        .await
        .unwrap();
    assert_eq!(stopped, KeeperStopped);
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn test_provider_cancelled_negotiation_is_recognisable() {
    let provider = Provider::ProtonVpn(ProtonVpn::new(sample_catalog()));
    let gateway = MockGateway::echo();
    let logger = RecordingLogger::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let error = provider
        .negotiate_port_forward(&cancel, &gateway, gateway_ip(), &logger)
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert!(!Error::PortForwardNotSupported("Torguard").is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_protonvpn_keeps_negotiated_lease() {
    let provider = Provider::ProtonVpn(ProtonVpn::new(sample_catalog()));
    let gateway = MockGateway::new(vec![grant(4000, 20, 1), grant(4000, 20, 1)]);
    let logger = RecordingLogger::default();
    let cancel = CancellationToken::new();

    let forwarded = provider
        .negotiate_forwarded_port(&cancel, &gateway, gateway_ip(), &logger)
        .await
        .unwrap();
    assert_eq!(forwarded.port, 4000);

    // A 20s lease renews at 10s
    let canceller = async {
        tokio::time::sleep(Duration::from_secs(11)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(
        provider.keep_forwarded_port(&cancel, &gateway, forwarded, gateway_ip(), &logger),
        canceller
    );

    assert_eq!(result.unwrap(), KeeperStopped);
    assert_eq!(gateway.requests().len(), 4);
}

#[tokio::test]
async fn test_protonvpn_custom_port_forward_settings() {
    let settings = PortForwardSettings {
        lifetime_secs: 300,
        refresh_interval_secs: 240,
        ..Default::default()
    };
    let proton = ProtonVpn::new(Vec::new()).with_port_forward_settings(settings.clone());
    assert_eq!(proton.port_forward_settings(), &settings);

    let gateway = MockGateway::echo();
    let logger = RecordingLogger::default();
    proton
        .negotiate_port_forward(&CancellationToken::new(), &gateway, gateway_ip(), &logger)
        .await
        .unwrap();

    assert!(gateway
        .requests()
        .iter()
        .all(|r| r.requested_lifetime.as_secs() == 300));
}
