//! Request/response values exchanged between the proxy pipeline and modules.
//!
//! These carry no transport types so that the pipeline can be driven by any
//! [`ModuleClient`](crate::collaborator::ModuleClient), including scripted
//! in-process ones in tests.  Header names are always lowercase.

use crate::module::ProxyType;
use crate::version::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowercased header name → value, deterministically ordered.
pub type Headers = BTreeMap<String, String>;

// ─────────────────────────────────────────────────────────────────────────────
// Well-known headers
// ─────────────────────────────────────────────────────────────────────────────

pub mod headers {
    pub const TENANT: &str = "x-okapi-tenant";
    pub const TOKEN: &str = "x-okapi-token";
    pub const AUTHORIZATION: &str = "authorization";
    pub const TRACE: &str = "x-okapi-trace";
    pub const STOP: &str = "x-okapi-stop";
    pub const MODULE_ID: &str = "x-okapi-module-id";
    pub const FILTER: &str = "x-okapi-filter";
    pub const REQUEST_ID: &str = "x-okapi-request-id";
    pub const URL: &str = "x-okapi-url";
    pub const PERMISSIONS_REQUIRED: &str = "x-okapi-permissions-required";
    pub const PERMISSIONS_DESIRED: &str = "x-okapi-permissions-desired";
    pub const MODULE_PERMISSIONS: &str = "x-okapi-module-permissions";
    /// Prefix of headers that filters may hand on to later steps.
    pub const OKAPI_PREFIX: &str = "x-okapi-";
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP method
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP method accepted by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Case-insensitive parse.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "HEAD" => Some(HttpMethod::Head),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response
// ─────────────────────────────────────────────────────────────────────────────

/// An inbound request as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: HttpMethod,
    /// Path without query string.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl ProxyRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Builder: attach a header (name is lowercased).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Path plus query string, as forwarded to modules.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.path),
            _ => self.path.clone(),
        }
    }
}

/// One outbound call to a module instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCall {
    pub module_id: ModuleId,
    pub proxy_type: ProxyType,
    pub method: HttpMethod,
    /// Path plus query string.
    pub uri: String,
    pub headers: Headers,
    /// Empty for `headers` calls.
    pub body: Vec<u8>,
}

/// What a module answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl ModuleResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Builder: attach a header (name is lowercased).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the module asked the pipeline to stop here.
    pub fn has_stop(&self) -> bool {
        self.headers.contains_key(headers::STOP)
    }
}
