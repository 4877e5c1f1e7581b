//! Interface queries against a tenant's current snapshot
//!
//! GET /_/proxy/tenants/{tenant}/interfaces?full=&type=   - provided interfaces
//! GET /_/proxy/tenants/{tenant}/interfaces/{interface}   - providers of one

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use okapi_kernel::{InterfaceDescriptor, InterfaceType};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::state::AppState;

/// Query of GET /interfaces
#[derive(Debug, Default, Deserialize)]
pub struct InterfacesQuery {
    /// Return whole descriptors, handlers included.
    #[serde(default)]
    pub full: bool,
    #[serde(default, rename = "type")]
    pub interface_type: Option<InterfaceType>,
}

impl InterfacesQuery {
    fn matches(&self, interface: &InterfaceDescriptor) -> bool {
        match self.interface_type {
            None => true,
            Some(InterfaceType::System) => interface.is_system(),
            Some(wanted) => interface.interface_type == wanted,
        }
    }
}

/// GET /tenants/{tenant}/interfaces
///
/// Interfaces of every enabled module in enablement order.  Without `full`
/// only `id` and `version` are listed.
pub async fn list_interfaces(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(query): Query<InterfacesQuery>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.tenants.snapshot(&tenant).await?;
    let listed: Vec<Value> = snapshot
        .descriptors
        .iter()
        .flat_map(|module| module.provides.iter())
        .filter(|interface| query.matches(interface))
        .map(|interface| {
            if query.full {
                json!(interface)
            } else {
                json!({ "id": interface.id, "version": interface.version })
            }
        })
        .collect();
    Ok(Json(listed))
}

/// GET /tenants/{tenant}/interfaces/{interface}
pub async fn interface_providers(
    State(state): State<Arc<AppState>>,
    Path((tenant, interface)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.tenants.snapshot(&tenant).await?;
    Ok(Json(snapshot.catalog.providers(&interface).to_vec()))
}

/// Build the interface query router sub-tree
pub fn interfaces_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new()
        .route("/tenants/{tenant}/interfaces", get(list_interfaces))
        .route(
            "/tenants/{tenant}/interfaces/{interface}",
            get(interface_providers),
        )
}
