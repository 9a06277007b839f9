//! Inbound read loop for one signaling connection.

use crate::config::{ProtocolErrorPolicy, SignalConfig};
use crate::dispatch::Dispatcher;
use crate::error::{WireError, WireResult};
use crate::framing::{read_framed_message, MessageSource};

use tracing::{debug, info, warn};

/// Read and dispatch frames until the connection closes.
///
/// Transport errors always end the loop. Protocol errors end it only under
/// [`ProtocolErrorPolicy::Close`]; otherwise they are logged and skipped.
pub async fn run_inbound_loop<R>(
    source: &mut R,
    dispatcher: &Dispatcher,
    policy: ProtocolErrorPolicy,
) -> WireResult<()>
where
    R: MessageSource + ?Sized,
{
    loop {
        let result = match read_framed_message(source).await {
            Ok(message) => dispatcher.dispatch(&message),
            Err(e) => Err(e),
        };

        match result {
            Ok(tag) => debug!(%tag, "frame dispatched"),
            Err(WireError::ConnectionClosed) => {
                info!("signaling connection closed");
                return Ok(());
            }
            Err(e) if e.is_protocol_error() && policy == ProtocolErrorPolicy::Continue => {
                warn!(error = %e, "dropping bad frame");
            }
            Err(e) => return Err(e),
        }
    }
}

/// [`run_inbound_loop`] with the policy and TTL taken from `config`.
pub async fn serve_connection<R>(
    source: &mut R,
    dispatcher: Dispatcher,
    config: &SignalConfig,
) -> WireResult<()>
where
    R: MessageSource + ?Sized,
{
    let dispatcher = dispatcher.with_peer_ttl(config.peer_ttl());
    run_inbound_loop(source, &dispatcher, config.on_protocol_error).await
}
