use axum::Router;

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the axum Router.
///
/// The collaboration core exposes only the WebSocket endpoint and a health
/// check; the CRUD resource API lives in a separate service.
pub fn build_router(state: AppState) -> Router {
    let ws_routes = Router::new().route(
        "/ws/strategic_map/{project_id}",
        axum::routing::get(ws_handler::ws_upgrade),
    );

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new().merge(ws_routes).merge(health).with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
