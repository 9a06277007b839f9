//! Star signaling wire protocol: the rendezvous relay's message core.
//!
//! Peers connect to the relay over a message-oriented duplex connection
//! (a socket.io WebSocket) to announce where they can be reached and to
//! trade opaque handshake payloads. This crate frames, decodes and routes
//! those messages; connection lifecycle belongs to the caller.
//!
//! ## Architecture
//!
//! - **framing**: connection halves, prefix stripping, serialized writes
//! - **message**: frame tags, outbound encoding, tag-first inbound decoding
//! - **destination**: splits an announced multiaddr into peer ID and route
//! - **dispatch**: routes frames to an [`AddressBook`] or [`HandshakeBroker`]
//! - **book** / **broker**: in-memory implementations of those collaborators
//! - **session**: the per-connection read loop
//! - **ws**: `tokio-tungstenite` adapter

pub mod book;
pub mod broker;
pub mod config;
pub mod destination;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod message;
pub mod session;
pub mod ws;

pub use book::{PeerAddressBook, PeerAddressEntry};
pub use broker::HandshakeSubscription;
pub use config::{LockScope, ProtocolErrorPolicy, SignalConfig};
pub use destination::{extract_peer_destination, PeerDestination};
pub use dispatch::{dispatch, AddressBook, Dispatcher, HandshakeBroker, PEER_ALIVE_TTL};
pub use error::{WireError, WireResult};
pub use framing::{
    read_empty_ack, read_framed_message, write_frame, FrameWriter, MessageSink, MessageSource,
    SendLock,
};
pub use message::{encode_frame, FrameTag, HandshakeEnvelope, TRANSPORT_PREFIX};
pub use session::{run_inbound_loop, serve_connection};
pub use ws::{split_websocket, WsSink, WsSource};
