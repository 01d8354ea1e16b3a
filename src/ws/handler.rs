use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth;
use crate::state::AppState;
use crate::ws::{actor, Channel};

/// Query parameters for the WebSocket handshake. Auth is via `?token=JWT`.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// GET /ws/chat?token=JWT
pub async fn chat_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, params, ws, Channel::Chat)
}

/// GET /ws/calls?token=JWT
pub async fn calls_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, params, ws, Channel::Calls)
}

fn upgrade(
    state: AppState,
    params: WsAuthQuery,
    ws: WebSocketUpgrade,
    channel: Channel,
) -> Response {
    match auth::validate_token(&state.jwt_secret, &params.token) {
        Ok(claims) => {
            info!(
                user_id = %claims.sub,
                channel = ?channel,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, claims.sub, channel))
        }
        Err(e) => {
            // No error event: the failure is observable client-side only as
            // a closed socket.
            warn!(channel = ?channel, error = %e, "WebSocket auth failed");
            ws.on_upgrade(|socket| async move {
                drop(socket);
            })
        }
    }
}
