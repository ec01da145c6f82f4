//! Interact WebSocket handler
//!
//! Alternative downstream endpoint backed by the request/response interact API
//! instead of a streaming agent link. Each client gets its own user id; every
//! utterance becomes one REST round trip on this connection's task.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::interact::{
    DEFAULT_GREETING, FALLBACK_REPLY, InteractClient, InteractReply, TraceOutcome,
};
use crate::core::protocol::VoceraInbound;
use crate::state::{AppState, ConnectionSlot};

/// Interact WebSocket handler; 404 when the interact API is not configured
pub async fn interact_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(slot): Extension<Arc<ConnectionSlot>>,
) -> Response {
    let Some(client) = state.interact.clone() else {
        return (StatusCode::NOT_FOUND, "Interact route is not configured").into_response();
    };

    ws.on_upgrade(move |socket| handle_interact_socket(socket, client, slot))
}

async fn handle_interact_socket(
    socket: WebSocket,
    client: Arc<InteractClient>,
    _slot: Arc<ConnectionSlot>,
) {
    let (mut sender, mut receiver) = socket.split();
    let user_id = format!("user-{}", Uuid::new_v4());
    info!(user_id = %user_id, "Interact client connected");

    let greeting = match client.launch(&user_id).await {
        Ok(traces) => TraceOutcome::from_traces(&traces),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Interact launch failed");
            TraceOutcome::default()
        }
    };
    let text = greeting
        .text
        .unwrap_or_else(|| DEFAULT_GREETING.to_string());
    if greeting.ended && !send_reply(&mut sender, InteractReply::end()).await {
        return;
    }
    if !send_reply(&mut sender, InteractReply::content(text)).await {
        return;
    }

    while let Some(msg_result) = receiver.next().await {
        let text = match msg_result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Interact WebSocket error");
                break;
            }
        };

        let inbound: VoceraInbound = match serde_json::from_str(text.as_str()) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Dropping malformed message");
                continue;
            }
        };
        let Some(utterance) = inbound.text() else {
            debug!(user_id = %user_id, "Ignoring empty message");
            continue;
        };

        let replies = match client.send_text(&user_id, utterance).await {
            Ok(traces) => {
                let outcome = TraceOutcome::from_traces(&traces);
                let mut replies = Vec::new();
                if outcome.ended {
                    replies.push(InteractReply::end());
                }
                if let Some(text) = outcome.text {
                    replies.push(InteractReply::content(text));
                }
                replies
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Interact request failed");
                vec![InteractReply::content(FALLBACK_REPLY)]
            }
        };

        for reply in replies {
            if !send_reply(&mut sender, reply).await {
                return;
            }
        }
    }

    info!(user_id = %user_id, "Interact client disconnected");
}

async fn send_reply(sender: &mut SplitSink<WebSocket, Message>, reply: InteractReply) -> bool {
    let json_str = match serde_json::to_string(&reply) {
        Ok(json_str) => json_str,
        Err(e) => {
            error!("Failed to serialize interact reply: {}", e);
            return true;
        }
    };
    match sender.send(Message::Text(json_str.into())).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to send interact reply: {}", e);
            false
        }
    }
}
