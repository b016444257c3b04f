use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for the strategic map WebSocket connection.
/// Auth is via query param ?token=JWT; the token is optional.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws/strategic_map/{project_id}?token=JWT
///
/// WebSocket upgrade endpoint for a project's map room. The connect policy
/// is permissive: a missing or invalid token still upgrades, but the
/// connection is tagged unauthenticated and its events are dropped by the
/// protocol layer. Only the credential decides identity — never ambient
/// request state.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = params
        .token
        .as_deref()
        .and_then(|token| match jwt::validate_access_token(&state.jwt_secret, token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Rejecting credential, connection continues unauthenticated");
                None
            }
        });

    match &identity {
        Some(claims) => tracing::info!(
            project_id,
            user_id = claims.sub,
            username = %claims.username,
            "WebSocket connection authenticated"
        ),
        None => tracing::info!(project_id, "WebSocket connection unauthenticated"),
    }

    ws.on_upgrade(move |socket| actor::run_connection(socket, state, project_id, identity))
}
