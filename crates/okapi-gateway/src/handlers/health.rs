//! Liveness probe
//!
//! GET /_/proxy/health - the gateway is up

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health
///
/// Always 200 while the process is alive; reports the number of known
/// module instances.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "okapi-gateway",
            "instances": state.discovery.list().len(),
        })),
    )
}

/// Build the health router sub-tree
pub fn health_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new().route("/health", get(health))
}
