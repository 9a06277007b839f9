//! WebSocket transport for the signaling wire.
//!
//! Splits a `tokio-tungstenite` stream into a [`MessageSource`] and a
//! [`MessageSink`]. Frames go out as text messages; ping and pong frames
//! are consumed here and never reach the dispatcher.

use crate::error::{WireError, WireResult};
use crate::framing::{MessageSink, MessageSource};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

/// Read half of a signaling WebSocket.
pub struct WsSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Write half of a signaling WebSocket.
pub struct WsSink<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
}

/// Split an established WebSocket into its read and write halves.
pub fn split_websocket<S>(ws: WebSocketStream<S>) -> (WsSource<S>, WsSink<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    (
        WsSource { stream },
        WsSink {
            sink: Mutex::new(sink),
        },
    )
}

#[async_trait]
impl<S> MessageSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv_message(&mut self) -> WireResult<Vec<u8>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "websocket close received");
                    return Err(WireError::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(WireError::TransportRead(e.to_string())),
                None => return Err(WireError::ConnectionClosed),
            }
        }
    }
}

#[async_trait]
impl<S> MessageSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_message(&self, message: Vec<u8>) -> WireResult<()> {
        let text = String::from_utf8(message)
            .map_err(|e| WireError::TransportWrite(format!("frame is not UTF-8: {e}")))?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| WireError::TransportWrite(e.to_string()))
    }
}

impl<S> WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send a close frame and flush.
    pub async fn close(&self) -> WireResult<()> {
        let mut sink = self.sink.lock().await;
        sink.close()
            .await
            .map_err(|e| WireError::TransportWrite(e.to_string()))
    }
}
