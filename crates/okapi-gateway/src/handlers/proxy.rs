//! Proxy entry point: every path the admin API does not claim.
//!
//! ```text
//! axum request ──► ProxyRequest ──► token/tenant ──► tenant snapshot
//!                                                        │
//!      axum response ◄── ModuleResponse + trace ◄── ProxyPipeline
//! ```

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use okapi_kernel::proxy::headers;
use okapi_kernel::{Headers, HttpMethod, ModuleResponse, ProxyRequest};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::pipeline::headers::{normalize_token, resolve_tenant};
use crate::state::AppState;

/// Fallback handler routing the request through the tenant's modules.
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    header_map: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(method) = HttpMethod::from_str_ci(method.as_str()) else {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({
                "error": {
                    "code": "USER",
                    "message": format!("Method {method} is not supported"),
                }
            })),
        )
            .into_response();
    };

    let mut request = ProxyRequest::new(method, uri.path()).with_body(body.to_vec());
    request.query = uri.query().map(str::to_string);
    request.headers = collect_headers(&header_map);

    if let Err(err) = normalize_token(&mut request.headers) {
        return ApiError(err).into_response();
    }
    let tenant = match resolve_tenant(&mut request.headers) {
        Ok(tenant) => tenant,
        Err(err) => return ApiError(err).into_response(),
    };
    let snapshot = match state.tenants.snapshot(&tenant).await {
        Ok(snapshot) => snapshot,
        Err(err) => return ApiError(err).into_response(),
    };
    debug!(tenant = %tenant, method = %method, path = %request.path, "proxy");

    match state.pipeline.execute(&snapshot.table, request).await {
        Ok(outcome) => build_axum_response(outcome.response, &outcome.trace),
        Err(err) => err.into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Lowercased headers; repeated values are joined with `, `.
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else { continue };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Convert a module response into an axum [`Response`], appending one
/// `X-Okapi-Trace` header per executed step.
fn build_axum_response(response: ModuleResponse, trace: &[String]) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in &response.headers {
        if matches!(name.as_str(), "content-length" | "transfer-encoding" | "connection") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            builder = builder.header(name, value);
        }
    }
    for entry in trace {
        if let Ok(value) = HeaderValue::from_str(entry) {
            builder = builder.header(headers::TRACE, value);
        }
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
