//! Session limit middleware for WebSocket connections
//!
//! Reserves a connection slot for every WebSocket upgrade request and rejects
//! the request with 503 when all `MAX_SESSIONS` slots are taken. The slot is
//! handed to the handler as an `Extension<Arc<ConnectionSlot>>` and released
//! when the socket task drops it. Other requests pass through.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use vocera_bridge::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/", get(bridge_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::AppState;

pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Only apply limits to WebSocket upgrade requests
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    match state.try_acquire_connection() {
        Some(slot) => {
            // Dropped with the request if the handler never upgrades
            request.extensions_mut().insert(Arc::new(slot));
            next.run(request).await
        }
        None => {
            tracing::warn!(
                connections = state.active_connections(),
                "Rejecting connection: session limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
    }
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}
