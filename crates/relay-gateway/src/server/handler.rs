//! WebSocket handler
//!
//! Drives one upgraded socket: a reader task feeding the inbound path, a writer
//! task draining the connection's queue, and teardown through the lifecycle
//! controller when either side stops or a broadcast could not reach the client.

use crate::lifecycle::{wait_for_shutdown, DisconnectCause};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Time the writer gets to flush queued frames after teardown
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Query parameters accepted on upgrade
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Identity attached to everything this connection publishes
    pub user_id: Option<String>,
}

impl ConnectParams {
    /// Resolve the connection identity, falling back to `default`
    pub fn identity(self, default: &str) -> String {
        self.user_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = params.identity(&state.settings().default_identity);
    ws.on_upgrade(move |socket| handle_socket(state, socket, identity))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, mut socket: WebSocket, identity: String) {
    let (tx, rx) = mpsc::channel::<String>(state.settings().outbound_buffer);

    let connection = match state.lifecycle().on_accept(identity, tx) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!(error = %e, "Rejecting connection");
            let close = Message::Close(Some(CloseFrame {
                code: close_code::ERROR,
                reason: "registration failed".into(),
            }));
            let _ = socket.send(close).await;
            return;
        }
    };

    let (ws_sink, ws_stream) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        ws_sink,
        rx,
        connection.id().to_string(),
        state.settings().send_timeout(),
    ));

    let inbound = state.inbound().clone();
    let reader_connection = connection.clone();
    let mut reader =
        tokio::spawn(async move { inbound.run(&reader_connection, ws_stream).await });

    let mut shutdown = state.shutdown();
    let mut writer_done = false;

    let cause = tokio::select! {
        result = &mut reader => match result {
            Ok(cause) => cause,
            Err(e) => DisconnectCause::ReceiveError(e.to_string()),
        },
        _ = &mut writer => {
            writer_done = true;
            DisconnectCause::SendFailed
        }
        () = connection.failed() => DisconnectCause::SendFailed,
        () = wait_for_shutdown(&mut shutdown) => DisconnectCause::Shutdown,
    };

    reader.abort();
    state.lifecycle().on_disconnect(&connection, cause).await;

    // Releasing the connection closed the queue; let the writer send what is
    // left and close the socket.
    if !writer_done && tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(connection_id = %connection.id(), "Writer did not finish, aborting");
        writer.abort();
    }
}

/// Drain the connection's queue into the socket
///
/// Ends when the queue is released or a write fails or stalls past
/// `write_timeout`.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    connection_id: String,
    write_timeout: Duration,
) {
    while let Some(frame) = rx.recv().await {
        match tokio::time::timeout(write_timeout, sink.send(Message::Text(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Failed to send message to WebSocket"
                );
                return;
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "WebSocket write stalled"
                );
                return;
            }
        }
    }

    // Queue released: close the socket
    let _ = sink.close().await;
}
