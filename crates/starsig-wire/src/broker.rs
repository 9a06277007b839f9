//! Handshake fan-out.
//!
//! [`HandshakeSubscription`] broadcasts every relayed handshake payload to all
//! current subscribers. Payloads emitted while nobody listens are dropped.

use crate::config::SignalConfig;
use crate::dispatch::HandshakeBroker;
use crate::message::HandshakeEnvelope;

use tokio::sync::broadcast;
use tracing::debug;

/// Default number of buffered payloads per subscriber.
pub const DEFAULT_HANDSHAKE_BUFFER: usize = 64;

/// Broadcast broker for handshake payloads.
#[derive(Debug, Clone)]
pub struct HandshakeSubscription {
    tx: broadcast::Sender<HandshakeEnvelope>,
}

impl HandshakeSubscription {
    /// Create a broker buffering up to `capacity` payloads per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn from_config(config: &SignalConfig) -> Self {
        Self::new(config.handshake_buffer)
    }

    /// Receive every payload emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<HandshakeEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for HandshakeSubscription {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_BUFFER)
    }
}

impl HandshakeBroker for HandshakeSubscription {
    fn emit(&self, envelope: HandshakeEnvelope) {
        match self.tx.send(envelope) {
            Ok(receivers) => debug!(receivers, "handshake delivered"),
            Err(_) => debug!("handshake dropped: no subscribers"),
        }
    }
}
