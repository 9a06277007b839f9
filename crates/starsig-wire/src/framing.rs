//! Transport framing around raw connection messages.
//!
//! The connection is message oriented: [`MessageSource`] yields complete
//! messages and [`MessageSink`] writes complete messages. The transport may
//! prepend its own markers (e.g. the socket.io packet type `42`), so inbound
//! messages are trimmed to the first JSON token before decoding.
//!
//! Outbound writes are serialized through a [`SendLock`]. A lock is either
//! private to one connection or the single process-wide lock, see
//! [`LockScope`].

use crate::config::LockScope;
use crate::error::{WireError, WireResult};
use crate::message::encode_frame;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::debug;

/// Read half of a message-oriented connection.
#[async_trait]
pub trait MessageSource: Send {
    /// Receive one complete message.
    ///
    /// Returns [`WireError::ConnectionClosed`] once the remote side is gone.
    async fn recv_message(&mut self) -> WireResult<Vec<u8>>;
}

/// Write half of a message-oriented connection.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send one complete message.
    async fn send_message(&self, message: Vec<u8>) -> WireResult<()>;
}

/// Serializes outbound frames so their bytes never interleave.
#[derive(Debug, Clone, Default)]
pub struct SendLock(Arc<Mutex<()>>);

impl SendLock {
    /// A lock private to whoever holds its clones.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock shared by every writer in the process.
    pub fn process_wide() -> Self {
        static GLOBAL: OnceLock<SendLock> = OnceLock::new();
        GLOBAL.get_or_init(SendLock::new).clone()
    }

    pub fn for_scope(scope: LockScope) -> Self {
        match scope {
            LockScope::Connection => Self::new(),
            LockScope::Process => Self::process_wide(),
        }
    }

    /// Whether both handles guard the same lock.
    pub fn shares_with(&self, other: &SendLock) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Read one message and strip everything before the first `[` or `{`.
pub async fn read_framed_message<R>(source: &mut R) -> WireResult<Vec<u8>>
where
    R: MessageSource + ?Sized,
{
    let mut message = source.recv_message().await?;
    let start = message
        .iter()
        .position(|b| matches!(b, b'[' | b'{'))
        .ok_or(WireError::TokenNotFound)?;
    message.drain(..start);
    Ok(message)
}

/// Read one message that must not carry an object payload.
///
/// Fails only when the first `{` sits after some prefix bytes. Arrays,
/// bare prefixes and an object at index 0 all pass.
pub async fn read_empty_ack<R>(source: &mut R) -> WireResult<()>
where
    R: MessageSource + ?Sized,
{
    let message = source.recv_message().await?;
    match message.iter().position(|&b| b == b'{') {
        Some(i) if i > 0 => Err(WireError::UnexpectedObjectToken),
        _ => Ok(()),
    }
}

/// Encode a frame and write it as a single message under `lock`.
pub async fn write_frame<S, T>(
    sink: &S,
    lock: &SendLock,
    tag: &str,
    body: Option<&T>,
) -> WireResult<()>
where
    S: MessageSink + ?Sized,
    T: Serialize + Sync + ?Sized,
{
    let bytes = encode_frame(tag, body)?;
    let _guard = lock.0.lock().await;
    debug!(tag, len = bytes.len(), "sending frame");
    sink.send_message(bytes).await
}

/// A sink bound to the lock that serializes its writes.
pub struct FrameWriter<S> {
    sink: S,
    lock: SendLock,
}

impl<S: MessageSink> FrameWriter<S> {
    pub fn new(sink: S, lock: SendLock) -> Self {
        Self { sink, lock }
    }

    /// Bind a sink using the lock selected by `scope`.
    pub fn with_scope(sink: S, scope: LockScope) -> Self {
        Self::new(sink, SendLock::for_scope(scope))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn lock(&self) -> &SendLock {
        &self.lock
    }

    /// Write `["tag",body]` as one message.
    pub async fn write_frame<T>(&self, tag: &str, body: Option<&T>) -> WireResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        write_frame(&self.sink, &self.lock, tag, body).await
    }

    /// Write a body-less `["tag"]` frame.
    pub async fn write_tag(&self, tag: &str) -> WireResult<()> {
        self.write_frame::<()>(tag, None).await
    }
}
