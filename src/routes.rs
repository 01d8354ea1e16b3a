use axum::{routing::get, Json, Router};

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /healthz — liveness probe.
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "quckapp-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// Build the axum Router: the two WebSocket namespaces plus health.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/chat", get(ws_handler::chat_upgrade))
        .route("/ws/calls", get(ws_handler::calls_upgrade))
        .route("/healthz", get(healthz))
        .with_state(state)
}
