//! Peer destination extraction.
//!
//! A `ws-peer` announcement carries an address such as
//! `/ip4/1.2.3.4/tcp/4001/ipfs/<peer-id>`. The routable part is the address
//! with the identity component removed; the identity is decoded separately
//! so the address book can key on it.

use crate::error::{WireError, WireResult};

use libp2p_identity::PeerId;
use multiaddr::{Multiaddr, Protocol};
use std::str::FromStr;

/// Where a peer can be reached, split into identity and routable address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDestination {
    pub peer_id: PeerId,
    /// The announced address without its identity component.
    pub address: Multiaddr,
}

/// Parse an announced address into a [`PeerDestination`].
pub fn extract_peer_destination(peer_addr: &str) -> WireResult<PeerDestination> {
    let parsed = Multiaddr::from_str(peer_addr).map_err(|e| classify_parse_error(peer_addr, e))?;

    let peer_id = parsed
        .iter()
        .find_map(|proto| match proto {
            Protocol::P2p(peer_id) => Some(peer_id),
            _ => None,
        })
        .ok_or(WireError::MissingPeerIdentityComponent)?;

    let identity = Multiaddr::empty().with(Protocol::P2p(peer_id));
    Ok(PeerDestination {
        peer_id,
        address: decapsulate(&parsed, &identity),
    })
}

/// Remove the last occurrence of `suffix` and everything after it.
///
/// Returns `addr` unchanged when `suffix` does not occur in it.
pub fn decapsulate(addr: &Multiaddr, suffix: &Multiaddr) -> Multiaddr {
    let parts: Vec<Protocol<'_>> = addr.iter().collect();
    let tail: Vec<Protocol<'_>> = suffix.iter().collect();
    if tail.is_empty() || tail.len() > parts.len() {
        return addr.clone();
    }

    match (0..=parts.len() - tail.len())
        .rev()
        .find(|&i| parts[i..i + tail.len()] == tail[..])
    {
        Some(start) => parts.into_iter().take(start).collect(),
        None => addr.clone(),
    }
}

/// The multiaddr parser validates identity values itself, so a bad peer ID
/// surfaces as a parse error. Re-check the identity segments to report it
/// as what it is.
fn classify_parse_error(peer_addr: &str, err: multiaddr::Error) -> WireError {
    for value in identity_segments(peer_addr) {
        if let Err(e) = PeerId::from_str(value) {
            return WireError::PeerIdentifierDecode(format!("{value}: {e}"));
        }
    }
    WireError::MultiaddrParse(err)
}

/// Values following an `ipfs` or `p2p` segment that sits in protocol position.
///
/// A segment is in protocol position only when everything before it parses
/// as a multiaddr, so `/dns4/ipfs/...` names a host, not an identity.
fn identity_segments(peer_addr: &str) -> Vec<&str> {
    let segments: Vec<&str> = peer_addr.split('/').collect();
    segments
        .iter()
        .enumerate()
        .filter(|(_, segment)| **segment == "ipfs" || **segment == "p2p")
        .filter(|(i, _)| {
            let prefix = segments[..*i].join("/");
            prefix.is_empty() || Multiaddr::from_str(&prefix).is_ok()
        })
        .filter_map(|(i, _)| segments.get(i + 1).copied())
        .collect()
}
