//! HTTP rendering of gateway errors.
//!
//! The kernel's [`GatewayError`] carries the classification; this module
//! turns it into `{"error": {"code", "message"}}` with the mapped status.
//! Pipeline failures additionally carry the trace collected so far, which
//! is returned as `X-Okapi-Trace` headers.

use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use okapi_kernel::{GatewayError, VersionError};
use okapi_kernel::proxy::headers;
use serde_json::json;

/// Axum-facing wrapper around [`GatewayError`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<VersionError> for ApiError {
    fn from(err: VersionError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.error_type();
        let status =
            StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "code": kind.code(),
                "message": self.0.message(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// A failed pipeline run and the steps that executed before it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    pub error: GatewayError,
    pub trace: Vec<String>,
}

impl PipelineError {
    pub fn new(error: GatewayError, trace: Vec<String>) -> Self {
        Self { error, trace }
    }
}

impl From<GatewayError> for PipelineError {
    fn from(error: GatewayError) -> Self {
        Self::new(error, Vec::new())
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for PipelineError {}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let mut response = ApiError(self.error).into_response();
        let name = HeaderName::from_static(headers::TRACE);
        for entry in self.trace {
            if let Ok(value) = HeaderValue::from_str(&entry) {
                response.headers_mut().append(name.clone(), value);
            }
        }
        response
    }
}
