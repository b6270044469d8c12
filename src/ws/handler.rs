//! WebSocket upgrade handler and per-connection pump loops
//!
//! Each connection runs exactly one inbound loop and one outbound loop, and
//! only those two tasks ever touch the socket halves. That split is what makes
//! socket access race-free without locks.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::hub::{ConnectionHub, HubHandle};

/// Time allowed to write a message to the peer
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum message size allowed from the peer
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Capacity of the per-connection outbound queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let ws = ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .max_frame_size(state.config.read_buffer_size.max(MAX_MESSAGE_SIZE))
        .write_buffer_size(state.config.write_buffer_size);

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = connect(socket, state.hub.clone()).await;
    if client_id < 0 {
        warn!("connection rejected, hub unavailable");
    }
}

/// Register the socket with the hub and spawn its two pump loops.
/// Returns the assigned client identity, or -1 when registration fails
/// (in which case no loops are spawned).
pub async fn connect(socket: WebSocket, hub: HubHandle) -> i32 {
    let (outbound_tx, outbound_rx) = mpsc::channel::<Bytes>(OUTBOUND_QUEUE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let Some(client_id) = hub.register(outbound_tx, shutdown_tx).await else {
        return -1;
    };

    let (sink, stream) = socket.split();
    let conn = hub.connection_api(client_id);

    tokio::spawn(run_outbound(conn.clone(), sink, outbound_rx, shutdown_rx));
    tokio::spawn(run_inbound(stream, conn));

    info!(client_id, "connection established");
    client_id
}

/// Pump frames from the socket to the hub. The sole reader of the socket.
///
/// Runs until the socket errors or closes, then unconditionally unregisters
/// the connection; the hub side is idempotent, so racing teardown is safe.
pub async fn run_inbound<S, E>(mut stream: S, hub: ConnectionHub)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let client_id = hub.client_id();
    let limiter = ConnectionRateLimiter::new();

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Binary(data)) => {
                if !accept_frame(client_id, data.len(), &limiter) {
                    continue;
                }
                if hub.forward(Bytes::from(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                if !accept_frame(client_id, text.len(), &limiter) {
                    continue;
                }
                if hub.forward(Bytes::from(text.into_bytes())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(client_id, "keepalive frame");
            }
            Ok(Message::Close(_)) => {
                // Expected close: the peer went away.
                debug!(client_id, "client initiated close");
                break;
            }
            Err(e) => {
                warn!(client_id, error = %e, "websocket read error");
                break;
            }
        }
    }

    // Single exit path: teardown runs exactly once regardless of why we left.
    hub.unregister().await;
    debug!(client_id, "inbound loop closed");
}

fn accept_frame(client_id: i32, len: usize, limiter: &ConnectionRateLimiter) -> bool {
    if len > MAX_MESSAGE_SIZE {
        warn!(client_id, len, "oversized frame dropped");
        return false;
    }
    if !limiter.check_inbound() {
        warn!(client_id, "rate limited inbound frame");
        return false;
    }
    true
}

/// Pump payloads from the outbound queue to the socket. The sole writer.
///
/// Each write carries a bounded deadline; a timeout or sink error terminates
/// the loop immediately without retry and unregisters the connection, so the
/// inbound loop dies with it. When the hub closes the queue, nothing further
/// is drained: a final close frame is written and the loop exits.
pub async fn run_outbound<S>(
    hub: ConnectionHub,
    mut sink: S,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let client_id = hub.client_id();

    loop {
        tokio::select! {
            // Biased so a close signal wins over still-queued payloads.
            biased;

            _ = &mut shutdown => break,

            maybe = outbound_rx.recv() => {
                let Some(payload) = maybe else { break };
                match tokio::time::timeout(WRITE_WAIT, sink.send(Message::Binary(payload.to_vec()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(client_id, error = %e, "websocket write error");
                        hub.unregister().await;
                        return;
                    }
                    Err(_) => {
                        warn!(client_id, "write deadline exceeded");
                        hub.unregister().await;
                        return;
                    }
                }
            }
        }
    }

    // The hub closed the queue: acknowledge with a close frame.
    let _ = tokio::time::timeout(WRITE_WAIT, sink.send(Message::Close(None))).await;
    debug!(client_id, "outbound loop closed");
}
