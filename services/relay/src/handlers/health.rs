use crate::handlers::ws;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Liveness probe. Push clients may also upgrade here instead of on `/ws`.
pub async fn root(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(upgrade) => ws::upgrade(upgrade, state),
        Err(_) => (StatusCode::OK, Json(json!({ "works": "YES" }))).into_response(),
    }
}
