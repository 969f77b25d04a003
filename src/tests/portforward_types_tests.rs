use crate::portforward::{PortForwardError, PortMappingGrant, ProtocolError, gateway_restarted};
use crate::portforward::natpmp::NatPmpResultCode;
use std::time::Duration;

#[test]
fn test_grant_expiry_window() {
    let mut grant = PortMappingGrant::new(1, 0, 4000, Duration::from_secs(60));
    grant.granted_at_ms = 1_000_000;

    assert_eq!(grant.expires_at_ms(), 1_060_000);
    assert!(!grant.is_expired_at(1_059_999));
    assert!(grant.is_expired_at(1_060_000));
}

#[test]
fn test_grant_zero_lifetime_is_expired_immediately() {
    let grant = PortMappingGrant::new(1, 0, 4000, Duration::ZERO);
    assert!(grant.is_expired_at(grant.granted_at_ms));
}

#[test]
fn test_gateway_restart_detection() {
    assert!(!gateway_restarted(100, 100));
    assert!(!gateway_restarted(100, 160));
    assert!(gateway_restarted(100, 5));
}

#[test]
fn test_error_messages_carry_context() {
    let error = PortForwardError::protocol("adding TCP port mapping", ProtocolError::Timeout);
    assert_eq!(error.to_string(), "adding TCP port mapping: request timed out");

    let error = ProtocolError::Gateway(NatPmpResultCode::OutOfResources);
    assert_eq!(error.to_string(), "gateway error: Out of resources");
}
