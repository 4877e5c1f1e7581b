//! Tenant endpoints: registry, enabled modules and install batches
//!
//! POST   /_/proxy/tenants                          - create a tenant
//! GET    /_/proxy/tenants                          - list tenants
//! GET    /_/proxy/tenants/{tenant}                 - one tenant
//! DELETE /_/proxy/tenants/{tenant}                 - delete tenant and enablement
//! GET    /_/proxy/tenants/{tenant}/modules         - enabled modules
//! POST   /_/proxy/tenants/{tenant}/modules         - enable one module
//! GET    /_/proxy/tenants/{tenant}/modules/{id}    - is a module enabled
//! DELETE /_/proxy/tenants/{tenant}/modules/{id}    - disable one module
//! POST   /_/proxy/tenants/{tenant}/install         - plan/commit a batch
//! POST   /_/proxy/tenants/{tenant}/upgrade         - upgrade everything
//!
//! Install, upgrade and the single-module endpoints accept the flags
//! `simulate`, `deploy`, `purge`, `preRelease` and `npmSnapshot` as query
//! parameters.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use okapi_kernel::{
    GatewayError, InstallOptions, ModuleId, TenantDescriptor, TenantModuleRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::parse_json;
use crate::error::ApiResult;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// `{"id": "..."}`, used for enabled-module listings and enable requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub id: ModuleId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenants
// ─────────────────────────────────────────────────────────────────────────────

/// POST /tenants
pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let tenant: TenantDescriptor = parse_json(&body)?;
    let created = state.tenants.create(tenant).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /tenants
pub async fn list_tenants(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.tenants.list().await?))
}

/// GET /tenants/{tenant}
pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.tenants.get(&tenant).await?))
}

/// DELETE /tenants/{tenant}
pub async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.tenants.delete(&tenant).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Enabled modules
// ─────────────────────────────────────────────────────────────────────────────

/// GET /tenants/{tenant}/modules
pub async fn list_enabled(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let enabled: Vec<ModuleRef> = state
        .tenants
        .enabled(&tenant)
        .await?
        .into_iter()
        .map(|id| ModuleRef { id })
        .collect();
    Ok(Json(enabled))
}

/// POST /tenants/{tenant}/modules
///
/// Accepts a full module id or a product name; answers with the id that
/// got enabled.
pub async fn enable_module(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(options): Query<InstallOptions>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: ModuleRef = parse_json(&body)?;
    let id = state
        .tenants
        .enable_module(&tenant, request.id, options)
        .await?;
    Ok((StatusCode::CREATED, Json(ModuleRef { id })))
}

/// GET /tenants/{tenant}/modules/{id}
pub async fn get_enabled(
    State(state): State<Arc<AppState>>,
    Path((tenant, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let id = ModuleId::parse(&id)?;
    if !state.tenants.enabled(&tenant).await?.contains(&id) {
        return Err(GatewayError::not_found(format!(
            "Module {id} is not enabled for tenant {tenant}"
        ))
        .into());
    }
    Ok(Json(ModuleRef { id }))
}

/// DELETE /tenants/{tenant}/modules/{id}
pub async fn disable_module(
    State(state): State<Arc<AppState>>,
    Path((tenant, id)): Path<(String, String)>,
    Query(options): Query<InstallOptions>,
) -> ApiResult<impl IntoResponse> {
    let id = ModuleId::parse(&id)?;
    state.tenants.disable_module(&tenant, id, options).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Install batches
// ─────────────────────────────────────────────────────────────────────────────

/// POST /tenants/{tenant}/install
///
/// Body is a list of `{"id", "action"}` requests; answers with the plan.
pub async fn install(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(options): Query<InstallOptions>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let requests: Vec<TenantModuleRequest> = parse_json(&body)?;
    let plan = state.tenants.install(&tenant, &requests, options).await?;
    info!(tenant = %tenant, steps = plan.len(), simulate = options.simulate, "install");
    Ok(Json(plan))
}

/// POST /tenants/{tenant}/upgrade
pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(options): Query<InstallOptions>,
) -> ApiResult<impl IntoResponse> {
    let plan = state.tenants.upgrade(&tenant, options).await?;
    info!(tenant = %tenant, steps = plan.len(), simulate = options.simulate, "upgrade");
    Ok(Json(plan))
}

/// Build the tenant router sub-tree
pub fn tenants_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::{get, post};
    axum::Router::new()
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/{tenant}", get(get_tenant).delete(delete_tenant))
        .route(
            "/tenants/{tenant}/modules",
            get(list_enabled).post(enable_module),
        )
        .route(
            "/tenants/{tenant}/modules/{id}",
            get(get_enabled).delete(disable_module),
        )
        .route("/tenants/{tenant}/install", post(install))
        .route("/tenants/{tenant}/upgrade", post(upgrade))
}
