//! Module registry endpoints
//!
//! POST   /_/proxy/modules?check=  - register a module descriptor
//! GET    /_/proxy/modules         - list registered modules
//! GET    /_/proxy/modules/{id}    - one descriptor
//! DELETE /_/proxy/modules/{id}    - remove a module no tenant uses

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use okapi_kernel::{ModuleDescriptor, ModuleId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::parse_json;
use crate::error::ApiResult;
use crate::state::AppState;

/// Query of POST /modules
#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    /// Require every `requires` entry to be provided by a registered module.
    #[serde(default = "default_check")]
    pub check: bool,
}

fn default_check() -> bool {
    true
}

/// POST /modules
pub async fn register_module(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegisterQuery>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let descriptor: ModuleDescriptor = parse_json(&body)?;
    debug!(module = %descriptor.id, check = query.check, "register module");
    let registered = state.modules.register(descriptor, query.check).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// GET /modules
pub async fn list_modules(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.modules.list().await?))
}

/// GET /modules/{id}
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = ModuleId::parse(&id)?;
    Ok(Json(state.modules.get(&id).await?))
}

/// DELETE /modules/{id}
///
/// Rejected while any tenant has the module enabled.
pub async fn delete_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = ModuleId::parse(&id)?;
    state.tenants.delete_module(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build the module registry router sub-tree
pub fn modules_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new()
        .route("/modules", get(list_modules).post(register_module))
        .route("/modules/{id}", get(get_module).delete(delete_module))
}
