//! Frame codec.
//!
//! Every frame is a JSON array whose first element is a string tag:
//! `["ws-peer", "<multiaddr>"]` or `["ws-handshake", {...}]`. Outbound frames
//! are preceded by the socket.io event marker [`TRANSPORT_PREFIX`].
//!
//! Inbound frames are decoded in two steps: [`peek_tag`] reads only the tag,
//! then the tag-specific decoder parses the payload with its own schema.

use crate::error::{WireError, WireResult};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Literal written before every outbound frame (engine.io message + socket.io event).
pub const TRANSPORT_PREFIX: &str = "42";

/// Inbound frame tags understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    /// A peer announcing the address it can be reached at.
    WsPeer,
    /// An opaque handshake payload relayed between peers.
    WsHandshake,
}

impl FrameTag {
    /// The literal tag string on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WsPeer => "ws-peer",
            Self::WsHandshake => "ws-handshake",
        }
    }

    /// Exact literal match; no case folding or trimming.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ws-peer" => Some(Self::WsPeer),
            "ws-handshake" => Some(Self::WsHandshake),
            _ => None,
        }
    }
}

impl fmt::Display for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque handshake payload. Only its shape (a JSON object) is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandshakeEnvelope(Map<String, Value>);

impl HandshakeEnvelope {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Look up a single field without interpreting it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for HandshakeEnvelope {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Encode an outbound frame: prefix, `["tag"`, optional `,body`, then `]`.
///
/// The tag is written as-is; callers pass protocol constants that need no
/// escaping. A body that fails to serialize aborts before any bytes exist.
pub fn encode_frame<T: Serialize + ?Sized>(
    tag: &str,
    body: Option<&T>,
) -> Result<Vec<u8>, serde_json::Error> {
    let body = body.map(serde_json::to_vec).transpose()?;
    let body_len = body.as_ref().map_or(0, |b| b.len() + 1);

    let mut bytes = Vec::with_capacity(TRANSPORT_PREFIX.len() + tag.len() + 4 + body_len);
    bytes.extend_from_slice(TRANSPORT_PREFIX.as_bytes());
    bytes.extend_from_slice(b"[\"");
    bytes.extend_from_slice(tag.as_bytes());
    bytes.push(b'"');
    if let Some(body) = body {
        bytes.push(b',');
        bytes.extend_from_slice(&body);
    }
    bytes.push(b']');
    Ok(bytes)
}

/// Read only the tag of an inbound frame.
///
/// The whole message must be valid JSON, but only the first array element
/// is materialized. Valid JSON that is not a string-led array is reported
/// as [`WireError::UnknownMessageType`].
pub fn peek_tag(message: &[u8]) -> WireResult<String> {
    let head: FrameHead = serde_json::from_slice(message)?;
    head.0
        .ok_or_else(|| WireError::UnknownMessageType("<untagged frame>".to_string()))
}

/// Decode a `ws-peer` frame as its full list of string elements.
pub fn decode_peer_frame(message: &[u8]) -> WireResult<Vec<String>> {
    Ok(serde_json::from_slice(message)?)
}

/// Decode a `ws-handshake` frame, which must be exactly `[tag, {object}]`.
pub fn decode_handshake_frame(message: &[u8]) -> WireResult<HandshakeEnvelope> {
    let (_tag, envelope): (IgnoredAny, HandshakeEnvelope) = serde_json::from_slice(message)?;
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Tag-only decoding
// ---------------------------------------------------------------------------

/// Top-level value of a frame; holds the tag when the value is a string-led array.
struct FrameHead(Option<String>);

/// First element of a frame array; holds it only when it is a string.
struct TagElement(Option<String>);

impl<'de> Deserialize<'de> for FrameHead {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HeadVisitor { top_level: true })
    }
}

impl<'de> Deserialize<'de> for TagElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(HeadVisitor { top_level: false })
            .map(|head| TagElement(head.0))
    }
}

struct HeadVisitor {
    top_level: bool,
}

impl<'de> Visitor<'de> for HeadVisitor {
    type Value = FrameHead;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FrameHead, A::Error> {
        let tag = if self.top_level {
            seq.next_element::<TagElement>()?.and_then(|t| t.0)
        } else {
            None
        };
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(FrameHead(tag))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FrameHead, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(FrameHead(None))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FrameHead, E> {
        if self.top_level {
            Ok(FrameHead(None))
        } else {
            Ok(FrameHead(Some(v.to_owned())))
        }
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<FrameHead, E> {
        Ok(FrameHead(None))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<FrameHead, E> {
        Ok(FrameHead(None))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<FrameHead, E> {
        Ok(FrameHead(None))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<FrameHead, E> {
        Ok(FrameHead(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FrameHead, E> {
        Ok(FrameHead(None))
    }
}
