//! Picking one connection out of the candidate set

use super::types::{Connection, SelectionError};
use rand::Rng;
use rand::seq::SliceRandom;
use std::net::IpAddr;
use tracing::debug;

/// Pick the connection the tunnel dials
///
/// With a `target_ip` the first candidate on that address wins and a
/// missing address is an error, never a random fallback. Otherwise a
/// candidate is chosen uniformly with `rng`.
pub fn select_connection<R: Rng + ?Sized>(
    connections: &[Connection],
    target_ip: Option<IpAddr>,
    rng: &mut R,
) -> Result<Connection, SelectionError> {
    match target_ip {
        Some(ip) => find_target_ip(connections, ip),
        None => pick_random(connections, rng),
    }
}

/// First candidate whose address equals `target_ip`
pub fn find_target_ip(
    connections: &[Connection],
    target_ip: IpAddr,
) -> Result<Connection, SelectionError> {
    connections
        .iter()
        .find(|connection| connection.ip == target_ip)
        .copied()
        .ok_or(SelectionError::TargetIpNotFound(target_ip))
}

/// Uniformly random candidate
pub fn pick_random<R: Rng + ?Sized>(
    connections: &[Connection],
    rng: &mut R,
) -> Result<Connection, SelectionError> {
    let connection = connections
        .choose(rng)
        .copied()
        .ok_or(SelectionError::NoConnection)?;

    debug!(
        "Picked {} out of {} candidates",
        connection,
        connections.len()
    );

    Ok(connection)
}
