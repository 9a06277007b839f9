//! In-memory peer address book.
//!
//! [`PeerAddressBook`] is a thread-safe store of the addresses peers have
//! announced through the relay. Each address carries its own expiry; expired
//! addresses are hidden from lookups and dropped by [`PeerAddressBook::prune_expired`].

use crate::dispatch::AddressBook;

use chrono::{DateTime, Utc};
use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct AddrRecord {
    addr: Multiaddr,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl AddrRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Clone)]
struct PeerRecord {
    addrs: Vec<AddrRecord>,
    last_announced: DateTime<Utc>,
}

/// A snapshot of one peer's live addresses.
#[derive(Debug, Clone)]
pub struct PeerAddressEntry {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
    /// When the peer last announced any address.
    pub last_announced: DateTime<Utc>,
}

/// Thread-safe map from peer ID to its announced addresses.
#[derive(Debug, Clone, Default)]
pub struct PeerAddressBook {
    peers: Arc<RwLock<HashMap<PeerId, PeerRecord>>>,
}

impl PeerAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `addr` for `peer_id`. A known address keeps the later expiry.
    pub fn insert(&self, peer_id: PeerId, addr: Multiaddr, ttl: Duration) {
        let expires_at = Instant::now().checked_add(ttl);
        let mut peers = self.peers.write().unwrap_or_else(|e| e.into_inner());
        let record = peers.entry(peer_id).or_insert_with(|| PeerRecord {
            addrs: Vec::new(),
            last_announced: Utc::now(),
        });
        record.last_announced = Utc::now();

        if let Some(existing) = record.addrs.iter_mut().find(|r| r.addr == addr) {
            existing.expires_at = match (existing.expires_at, expires_at) {
                (Some(old), Some(new)) => Some(old.max(new)),
                _ => None,
            };
        } else {
            record.addrs.push(AddrRecord { addr, expires_at });
        }
    }

    /// Live addresses for a peer.
    pub fn addrs(&self, peer_id: &PeerId) -> Vec<Multiaddr> {
        let now = Instant::now();
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        peers
            .get(peer_id)
            .map(|record| {
                record
                    .addrs
                    .iter()
                    .filter(|r| r.is_live(now))
                    .map(|r| r.addr.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of one peer, if it has any live address.
    pub fn get_peer(&self, peer_id: &PeerId) -> Option<PeerAddressEntry> {
        let addrs = self.addrs(peer_id);
        if addrs.is_empty() {
            return None;
        }
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        peers.get(peer_id).map(|record| PeerAddressEntry {
            peer_id: *peer_id,
            addrs,
            last_announced: record.last_announced,
        })
    }

    /// Peers with at least one live address.
    pub fn peers(&self) -> Vec<PeerId> {
        let now = Instant::now();
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        peers
            .iter()
            .filter(|(_, record)| record.addrs.iter().any(|r| r.is_live(now)))
            .map(|(peer_id, _)| *peer_id)
            .collect()
    }

    /// Forget a peer and all of its addresses.
    pub fn remove_peer(&self, peer_id: &PeerId) -> bool {
        let mut peers = self.peers.write().unwrap_or_else(|e| e.into_inner());
        peers.remove(peer_id).is_some()
    }

    /// Drop expired addresses and peers left with none. Returns the number
    /// of addresses removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        let mut peers = self.peers.write().unwrap_or_else(|e| e.into_inner());
        peers.retain(|peer_id, record| {
            let before = record.addrs.len();
            record.addrs.retain(|r| r.is_live(now));
            let dropped = before - record.addrs.len();
            if dropped > 0 {
                debug!(peer = %peer_id, dropped, "pruned expired addresses");
            }
            removed += dropped;
            !record.addrs.is_empty()
        });
        removed
    }

    /// Number of peers with an entry, live or not.
    pub fn len(&self) -> usize {
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AddressBook for PeerAddressBook {
    fn add_addr(&self, peer_id: PeerId, addr: Multiaddr, ttl: Duration) {
        self.insert(peer_id, addr, ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn peer(s: &str) -> PeerId {
        PeerId::from_str(s).unwrap()
    }

    fn alice() -> PeerId {
        peer("QmcgpsyWgH8Y8ajJz1Cu72KnS5uo2Aa2LpzU7kinSupNKC")
    }

    fn bob() -> PeerId {
        peer("QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN")
    }

    fn ma(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_add_and_get() {
        let book = PeerAddressBook::new();
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), LONG);

        let entry = book.get_peer(&alice()).unwrap();
        assert_eq!(entry.peer_id, alice());
        assert_eq!(entry.addrs, vec![ma("/ip4/1.2.3.4/tcp/4001")]);
        assert!(book.get_peer(&bob()).is_none());
    }

    #[test]
    fn test_refresh_does_not_duplicate() {
        let book = PeerAddressBook::new();
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), LONG);
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), LONG);
        book.add_addr(alice(), ma("/ip4/5.6.7.8/tcp/4001"), LONG);
        assert_eq!(book.addrs(&alice()).len(), 2);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_refresh_keeps_later_expiry() {
        let book = PeerAddressBook::new();
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), LONG);
        // A shorter TTL must not cut the existing lease
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), Duration::ZERO);
        assert_eq!(book.addrs(&alice()).len(), 1);
    }

    #[test]
    fn test_expired_hidden_and_pruned() {
        let book = PeerAddressBook::new();
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), Duration::ZERO);
        book.add_addr(bob(), ma("/ip4/5.6.7.8/tcp/4001"), LONG);
        book.add_addr(bob(), ma("/ip4/5.6.7.8/tcp/4002"), Duration::ZERO);

        assert!(book.addrs(&alice()).is_empty());
        assert_eq!(book.peers(), vec![bob()]);
        assert_eq!(book.len(), 2);

        assert_eq!(book.prune_expired(), 2);
        assert_eq!(book.len(), 1);
        assert_eq!(book.addrs(&bob()), vec![ma("/ip4/5.6.7.8/tcp/4001")]);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let book = PeerAddressBook::new();
        let huge = Duration::from_secs(i64::MAX as u64);
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/1"), huge);
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/1"), Duration::ZERO);
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/2"), Duration::MAX);

        assert_eq!(book.addrs(&alice()).len(), 2);
        assert_eq!(book.prune_expired(), 0);
        assert_eq!(book.peers(), vec![alice()]);
    }

    #[test]
    fn test_remove_peer() {
        let book = PeerAddressBook::new();
        book.add_addr(alice(), ma("/ip4/1.2.3.4/tcp/4001"), LONG);
        assert!(book.remove_peer(&alice()));
        assert!(!book.remove_peer(&alice()));
        assert!(book.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let book = PeerAddressBook::new();
        let handle = book.clone();
        handle.add_addr(bob(), ma("/ip4/5.6.7.8/tcp/4001"), LONG);
        assert_eq!(book.peers(), vec![bob()]);
    }
}
