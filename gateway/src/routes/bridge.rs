use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{bridge_handler, interact_handler};
use crate::state::AppState;

/// WebSocket routes for downstream clients
///
/// The session limit middleware is applied in [`super::build_app`] once state is available.
pub fn create_bridge_router(with_interact: bool) -> Router<Arc<AppState>> {
    let router = Router::new().route("/", get(bridge_handler));

    let router = if with_interact {
        router.route("/interact", get(interact_handler))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
