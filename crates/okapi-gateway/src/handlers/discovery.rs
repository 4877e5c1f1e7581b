//! Discovery endpoints
//!
//! GET    /_/discovery/modules             - known instances
//! POST   /_/discovery/modules             - register a static instance
//! DELETE /_/discovery/modules/{srvc_id}   - forget an instance

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use okapi_kernel::GatewayError;
use serde::Deserialize;
use std::sync::Arc;

use super::parse_json;
use crate::backend::{Instance, InstanceOrigin};
use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for POST /modules
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInstance {
    /// Module id, or product to serve every version.
    pub srvc_id: String,
    pub url: String,
}

/// GET /modules
pub async fn list_instances(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.discovery.list())
}

/// POST /modules
pub async fn register_instance(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: RegisterInstance = parse_json(&body)?;
    if request.srvc_id.trim().is_empty() {
        return Err(GatewayError::user("srvcId must not be empty").into());
    }
    if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
        return Err(GatewayError::user(format!("Invalid instance url '{}'", request.url)).into());
    }
    state
        .discovery
        .register(&request.srvc_id, &request.url, InstanceOrigin::Static);
    let registered = Instance {
        srvc_id: request.srvc_id,
        url: request.url.trim_end_matches('/').to_string(),
        origin: InstanceOrigin::Static,
    };
    Ok((StatusCode::CREATED, Json(registered)))
}

/// DELETE /modules/{srvc_id}
pub async fn remove_instance(
    State(state): State<Arc<AppState>>,
    Path(srvc_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state.discovery.remove(&srvc_id) {
        return Err(GatewayError::not_found(format!("Instance {srvc_id} not found")).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Build the discovery router sub-tree
pub fn discovery_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::{delete, get};
    axum::Router::new()
        .route("/modules", get(list_instances).post(register_instance))
        .route("/modules/{srvc_id}", delete(remove_instance))
}
