//! Errors from the signaling wire layer.

use thiserror::Error;

/// Errors produced while reading, decoding, dispatching or writing frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// The raw message contained neither `[` nor `{`.
    #[error("Message token not found")]
    TokenNotFound,

    /// An acknowledgement carried an object after some prefix bytes.
    #[error("Empty message expected")]
    UnexpectedObjectToken,

    /// The frame was not valid JSON for the expected shape.
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A `ws-peer` frame arrived without its address element.
    #[error("Missing peer information")]
    MissingPeerInfo,

    /// The frame tag is not one this layer handles.
    #[error("Tried to process unknown message type: {0}")]
    UnknownMessageType(String),

    /// The announced address is not a valid multiaddr.
    #[error("Multiaddr parse error: {0}")]
    MultiaddrParse(#[from] multiaddr::Error),

    /// The announced address has no `/ipfs` or `/p2p` component.
    #[error("Address has no peer identity component")]
    MissingPeerIdentityComponent,

    /// The identity component does not hold a valid peer ID.
    #[error("Invalid peer identifier: {0}")]
    PeerIdentifierDecode(String),

    /// Reading from the underlying connection failed.
    #[error("Transport read error: {0}")]
    TransportRead(String),

    /// Writing to the underlying connection failed.
    #[error("Transport write error: {0}")]
    TransportWrite(String),

    /// The remote side closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// Whether this error describes a bad frame rather than a broken connection.
    ///
    /// Protocol errors leave the connection usable; the read loop consults
    /// its policy to decide whether to keep going.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::TokenNotFound
                | Self::UnexpectedObjectToken
                | Self::Decode(_)
                | Self::MissingPeerInfo
                | Self::UnknownMessageType(_)
                | Self::MultiaddrParse(_)
                | Self::MissingPeerIdentityComponent
                | Self::PeerIdentifierDecode(_)
        )
    }
}

/// Alias for Result with WireError.
pub type WireResult<T> = Result<T, WireError>;
