pub mod api;
pub mod bridge;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Assemble the full application router
pub fn build_app(state: Arc<AppState>) -> Router {
    let ws_routes = bridge::create_bridge_router(state.interact.is_some()).layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );

    api::create_api_router()
        .merge(ws_routes)
        .with_state(state)
}
