//! Inbound frame dispatch.
//!
//! The dispatcher reads a frame's tag, decodes the payload for that tag and
//! hands the result to a collaborator: peer announcements go to an
//! [`AddressBook`], handshake payloads to a [`HandshakeBroker`]. Nothing is
//! retained between calls.

use crate::destination::extract_peer_destination;
use crate::error::{WireError, WireResult};
use crate::message::{
    decode_handshake_frame, decode_peer_frame, peek_tag, FrameTag, HandshakeEnvelope,
};

use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long an announced address stays valid unless refreshed.
pub const PEER_ALIVE_TTL: Duration = Duration::from_secs(60);

/// Stores routable peer addresses. Expiry is the implementor's business.
pub trait AddressBook: Send + Sync {
    /// Record or refresh `addr` for `peer_id`, valid for `ttl`.
    fn add_addr(&self, peer_id: PeerId, addr: Multiaddr, ttl: Duration);
}

/// Delivers handshake payloads to whoever is waiting for them.
pub trait HandshakeBroker: Send + Sync {
    fn emit(&self, envelope: HandshakeEnvelope);
}

/// Dispatch one inbound frame using [`PEER_ALIVE_TTL`].
///
/// Returns the tag that was handled.
pub fn dispatch(
    message: &[u8],
    book: &dyn AddressBook,
    broker: &dyn HandshakeBroker,
) -> WireResult<FrameTag> {
    process_message(message, book, broker, PEER_ALIVE_TTL)
}

/// Owned dispatch context for a connection's read loop.
#[derive(Clone)]
pub struct Dispatcher {
    book: Arc<dyn AddressBook>,
    broker: Arc<dyn HandshakeBroker>,
    peer_ttl: Duration,
}

impl Dispatcher {
    pub fn new(book: Arc<dyn AddressBook>, broker: Arc<dyn HandshakeBroker>) -> Self {
        Self {
            book,
            broker,
            peer_ttl: PEER_ALIVE_TTL,
        }
    }

    /// Override the TTL handed to the address book.
    pub fn with_peer_ttl(mut self, ttl: Duration) -> Self {
        self.peer_ttl = ttl;
        self
    }

    pub fn peer_ttl(&self) -> Duration {
        self.peer_ttl
    }

    pub fn dispatch(&self, message: &[u8]) -> WireResult<FrameTag> {
        process_message(message, &*self.book, &*self.broker, self.peer_ttl)
    }
}

fn process_message(
    message: &[u8],
    book: &dyn AddressBook,
    broker: &dyn HandshakeBroker,
    ttl: Duration,
) -> WireResult<FrameTag> {
    let tag = peek_tag(message)?;
    match FrameTag::parse(&tag) {
        Some(FrameTag::WsPeer) => {
            let parts = decode_peer_frame(message)?;
            let peer_addr = parts.get(1).ok_or(WireError::MissingPeerInfo)?;
            process_ws_peer(book, peer_addr, ttl)?;
            Ok(FrameTag::WsPeer)
        }
        Some(FrameTag::WsHandshake) => {
            let envelope = decode_handshake_frame(message)?;
            debug!(fields = envelope.as_map().len(), "relaying handshake");
            broker.emit(envelope);
            Ok(FrameTag::WsHandshake)
        }
        None => Err(WireError::UnknownMessageType(tag)),
    }
}

fn process_ws_peer(book: &dyn AddressBook, peer_addr: &str, ttl: Duration) -> WireResult<()> {
    let dest = extract_peer_destination(peer_addr)?;
    debug!(peer = %dest.peer_id, addr = %dest.address, "peer announced");
    book.add_addr(dest.peer_id, dest.address, ttl);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Mutex;

    const PEER: &str = "QmcgpsyWgH8Y8ajJz1Cu72KnS5uo2Aa2LpzU7kinSupNKC";

    #[derive(Default)]
    struct RecordingBook {
        calls: Mutex<Vec<(PeerId, Multiaddr, Duration)>>,
    }

    impl AddressBook for RecordingBook {
        fn add_addr(&self, peer_id: PeerId, addr: Multiaddr, ttl: Duration) {
            self.calls.lock().unwrap().push((peer_id, addr, ttl));
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        emitted: Mutex<Vec<HandshakeEnvelope>>,
    }

    impl HandshakeBroker for RecordingBroker {
        fn emit(&self, envelope: HandshakeEnvelope) {
            self.emitted.lock().unwrap().push(envelope);
        }
    }

    fn peer_frame(addr: &str) -> Vec<u8> {
        serde_json::to_vec(&json!(["ws-peer", addr])).unwrap()
    }

    #[test]
    fn test_ws_peer_records_address_once() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        let msg = peer_frame(&format!("/ip4/1.2.3.4/tcp/4001/ipfs/{PEER}"));

        let tag = dispatch(&msg, &book, &broker).unwrap();
        assert_eq!(tag, FrameTag::WsPeer);

        let calls = book.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PeerId::from_str(PEER).unwrap());
        assert_eq!(calls[0].1, "/ip4/1.2.3.4/tcp/4001".parse::<Multiaddr>().unwrap());
        assert_eq!(calls[0].2, PEER_ALIVE_TTL);
        assert!(broker.emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ws_peer_without_address() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        match dispatch(br#"["ws-peer"]"#, &book, &broker) {
            Err(WireError::MissingPeerInfo) => {}
            other => panic!("Expected MissingPeerInfo, got {other:?}"),
        }
        assert!(book.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ws_peer_extra_elements_ignored() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        let msg = serde_json::to_vec(&json!([
            "ws-peer",
            format!("/ip4/10.0.0.1/tcp/9090/ws/p2p/{PEER}"),
            "extra"
        ]))
        .unwrap();
        dispatch(&msg, &book, &broker).unwrap();
        assert_eq!(book.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_ws_peer_extractor_errors_propagate() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        match dispatch(&peer_frame("/ip4/1.2.3.4/tcp/4001"), &book, &broker) {
            Err(WireError::MissingPeerIdentityComponent) => {}
            other => panic!("Expected MissingPeerIdentityComponent, got {other:?}"),
        }
        match dispatch(&peer_frame("garbage"), &book, &broker) {
            Err(WireError::MultiaddrParse(_)) => {}
            other => panic!("Expected MultiaddrParse, got {other:?}"),
        }
        assert!(book.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ws_peer_non_string_elements() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        match dispatch(br#"["ws-peer",7]"#, &book, &broker) {
            Err(WireError::Decode(_)) => {}
            other => panic!("Expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_ws_handshake_emits_once() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        let msg = br#"["ws-handshake",{"intentId":"i-1","srcMultiaddr":"/p2p/a","signal":{"type":"offer","sdp":"v=0"}}]"#;

        let tag = dispatch(msg, &book, &broker).unwrap();
        assert_eq!(tag, FrameTag::WsHandshake);

        let emitted = broker.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].get("intentId"), Some(&json!("i-1")));
        assert_eq!(emitted[0].get("signal"), Some(&json!({"type": "offer", "sdp": "v=0"})));
        assert!(book.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ws_handshake_malformed_json() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        let cases: [&[u8]; 2] = [br#"["ws-handshake",{"sdp":]"#, br#"["ws-handshake",[1]]"#];
        for msg in cases {
            match dispatch(msg, &book, &broker) {
                Err(WireError::Decode(_)) => {}
                other => panic!("Expected Decode, got {other:?}"),
            }
        }
        assert!(broker.emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ws_handshake_without_payload() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        // A recognized tag with no payload is a bad payload, not an unknown type
        let cases: [&[u8]; 3] = [
            br#"["ws-handshake"]"#,
            br#"["ws-handshake",null]"#,
            br#"["ws-handshake",{},{}]"#,
        ];
        for msg in cases {
            match dispatch(msg, &book, &broker) {
                Err(WireError::Decode(_)) => {}
                other => panic!("Expected Decode for {msg:?}, got {other:?}"),
            }
        }
        assert!(broker.emitted.lock().unwrap().is_empty());
        assert!(book.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_message_type() {
        let book = RecordingBook::default();
        let broker = RecordingBroker::default();
        match dispatch(br#"["ws-bogus",{}]"#, &book, &broker) {
            Err(WireError::UnknownMessageType(tag)) => assert_eq!(tag, "ws-bogus"),
            other => panic!("Expected UnknownMessageType, got {other:?}"),
        }
        // Tags are compared literally
        assert!(matches!(
            dispatch(br#"["WS-PEER","x"]"#, &book, &broker),
            Err(WireError::UnknownMessageType(_))
        ));
        assert!(matches!(
            dispatch(br#"{"type":"ws-peer"}"#, &book, &broker),
            Err(WireError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn test_dispatcher_custom_ttl() {
        let book = Arc::new(RecordingBook::default());
        let broker = Arc::new(RecordingBroker::default());
        let dispatcher = Dispatcher::new(book.clone(), broker.clone())
            .with_peer_ttl(Duration::from_secs(5));
        assert_eq!(dispatcher.peer_ttl(), Duration::from_secs(5));

        dispatcher
            .dispatch(&peer_frame(&format!("/ip4/1.2.3.4/tcp/4001/ipfs/{PEER}")))
            .unwrap();
        assert_eq!(book.calls.lock().unwrap()[0].2, Duration::from_secs(5));
    }
}
