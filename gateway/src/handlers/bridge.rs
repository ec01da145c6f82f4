//! Bridge WebSocket handler
//!
//! Each downstream client connection is paired with one upstream agent link.
//! The handler owns the client socket: a writer task drains the session's
//! [`DownstreamRoute`] queue while this task reads client frames and hands them
//! to the coordinator.

use axum::{
    Extension,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::session::{DownstreamHandle, DownstreamRoute};
use crate::state::{AppState, ConnectionSlot};

/// Buffer for frames queued towards one client
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long the writer gets to flush a close frame after the session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Bridge WebSocket handler
///
/// Upgrades the HTTP connection and pairs it with a fresh upstream agent link.
pub async fn bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(slot): Extension<Arc<ConnectionSlot>>,
) -> Response {
    debug!("Bridge WebSocket connection upgrade requested");

    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_bridge_socket(socket, state, slot))
}

async fn handle_bridge_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    _slot: Arc<ConnectionSlot>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut route_rx) = DownstreamHandle::channel(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let result = match route {
                DownstreamRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                DownstreamRoute::Close(reason) => {
                    let frame = reason.map(|reason| CloseFrame {
                        code: close_code::NORMAL,
                        reason: truncate_reason(reason).into(),
                    });
                    let _ = sender.send(Message::Close(frame)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let coordinator = app_state.coordinator.clone();
    let session = match coordinator.on_downstream_connect(handle.clone()) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Failed to create session");
            handle.close(format!("session setup failed: {e}")).await;
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task).await.is_err() {
                sender_task.abort();
            }
            return;
        }
    };
    let session_id = session.id().to_string();
    info!(session_id = %session_id, "Downstream client connected");

    loop {
        select! {
            _ = handle.closed() => {
                debug!(session_id = %session_id, "Downstream closed by gateway");
                break;
            }
            msg_result = receiver.next() => match msg_result {
                Some(Ok(Message::Text(text))) => {
                    coordinator.on_downstream_message(&session, text.as_str()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(session_id = %session_id, bytes = data.len(), "Ignoring binary downstream frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(session_id = %session_id, "Downstream connection closed by client");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "Downstream WebSocket error");
                    break;
                }
            }
        }
    }

    // Cleanup
    coordinator.on_downstream_disconnect(&session_id).await;
    handle.close("session ended").await;
    drop(session);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task).await.is_err() {
        sender_task.abort();
    }

    info!(session_id = %session_id, "Bridge connection terminated");
}

/// Close reasons are limited to 123 bytes on the wire
fn truncate_reason(mut reason: String) -> String {
    const MAX_REASON_BYTES: usize = 123;
    if reason.len() > MAX_REASON_BYTES {
        let mut end = MAX_REASON_BYTES;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}
