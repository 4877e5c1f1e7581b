//! Shared helpers for the gateway integration tests.
//!
//! The app is driven in-process with `tower::ServiceExt::oneshot`; modules
//! are played by a [`ScriptedClient`].

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use okapi_gateway::backend::Discovery;
use okapi_gateway::server::build_app;
use okapi_gateway::state::AppState;
use okapi_kernel::config::GatewayConfig;
use okapi_kernel::{ModuleCall, ModuleClient, ModuleResponse, TransportError};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

// ── Scripted modules ─────────────────────────────────────────────────────────

type Responder = Box<dyn Fn(&ModuleCall) -> ModuleResponse + Send + Sync>;

/// Answers per module product.  Unknown products reply 200 with
/// `{"module": "<id>"}`.
#[derive(Default)]
pub struct ScriptedClient {
    responders: HashMap<String, Responder>,
    calls: Mutex<Vec<ModuleCall>>,
}

impl ScriptedClient {
    pub fn on(
        mut self,
        product: &str,
        f: impl Fn(&ModuleCall) -> ModuleResponse + Send + Sync + 'static,
    ) -> Self {
        self.responders.insert(product.to_string(), Box::new(f));
        self
    }

    pub fn calls(&self) -> Vec<ModuleCall> {
        self.calls.lock().clone()
    }

    /// Products called, in call order.
    pub fn products(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.module_id.product().to_string())
            .collect()
    }
}

#[async_trait]
impl ModuleClient for ScriptedClient {
    async fn call(&self, call: ModuleCall) -> Result<ModuleResponse, TransportError> {
        self.calls.lock().push(call.clone());
        Ok(match self.responders.get(call.module_id.product()) {
            Some(responder) => responder(&call),
            None => ModuleResponse::new(200)
                .with_header("content-type", "application/json")
                .with_body(json!({ "module": call.module_id.to_string() }).to_string()),
        })
    }
}

// ── App ──────────────────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub client: Arc<ScriptedClient>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn traces(&self) -> Vec<String> {
        self.headers
            .get_all("x-okapi-trace")
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    pub fn error_message(&self) -> String {
        self.body["error"]["message"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

impl TestApp {
    pub fn new(client: ScriptedClient) -> Self {
        let client = Arc::new(client);
        let state = AppState::in_memory(
            &GatewayConfig::default(),
            Arc::new(Discovery::new()),
            client.clone(),
        );
        Self {
            router: build_app(state),
            client,
        }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> Reply {
        self.send("GET", uri, &[], None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Reply {
        self.send("POST", uri, &[], Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Reply {
        self.send("DELETE", uri, &[], None).await
    }

    /// Register a module, failing the test on error.
    pub async fn register(&self, descriptor: Value) {
        let reply = self.post("/_/proxy/modules?check=false", descriptor).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
    }

    pub async fn create_tenant(&self, id: &str) {
        let reply = self.post("/_/proxy/tenants", json!({ "id": id })).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
    }

    /// Enable modules for a tenant and return the plan.
    pub async fn install(&self, tenant: &str, ids: &[&str]) -> Value {
        let requests: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "action": "enable" }))
            .collect();
        let reply = self
            .post(
                &format!("/_/proxy/tenants/{tenant}/install"),
                Value::Array(requests),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        reply.body
    }
}

// ── Descriptors ──────────────────────────────────────────────────────────────

/// A module providing `interface` 1.0 with one GET/POST handler on `path`.
pub fn handler_module(id: &str, interface: &str, path: &str) -> Value {
    json!({
        "id": id,
        "provides": [{
            "id": interface,
            "version": "1.0",
            "handlers": [{ "methods": ["GET", "POST"], "pathPattern": path }]
        }]
    })
}

/// A module with one filter of `phase` on every path.
pub fn filter_module(id: &str, phase: &str) -> Value {
    json!({
        "id": id,
        "filters": [{ "methods": ["*"], "pathPattern": "/*", "phase": phase }]
    })
}
