//! The proxy pipeline: runs one tenant request through the matched modules.
//!
//! ```text
//!            ┌─────────── stop / non-2xx ───────────┐
//!            │                                      ▼
//! MATCH ──► FILTER_PRE ──► FILTER_AUTH ──► HANDLE ──► FILTER_POST ──► DONE
//!   │                                       │  ▲
//!   │                                       ▼  │
//!   │                                    REDIRECT (expanded at MATCH time)
//!   └──► ERROR (no handler, ambiguous, loop, transport failure)
//! ```
//!
//! The pipeline only reads the routing table it is given; callers hand it
//! the table of an immutable tenant snapshot.  Each step sees the request
//! headers plus whatever `x-okapi-*` headers earlier steps returned.  A
//! request-response handler's body becomes the next handler's input.

pub mod headers;
mod plan;

pub use plan::{ExecutionPlan, HandlerStep};

use crate::error::PipelineError;
use crate::router::{CompiledRoute, RoutingTable};
use okapi_kernel::proxy::headers as names;
use okapi_kernel::{
    GatewayError, Headers, HttpMethod, ModuleCall, ModuleClient, ModuleResponse, Phase,
    ProxyRequest, ProxyType, TransportError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header telling post filters the status of the handler result.
pub const HANDLER_RESULT: &str = "x-okapi-handler-result";

/// Final response plus the trace of executed steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub response: ModuleResponse,
    /// `"METHOD moduleId:status"` per executed step.
    pub trace: Vec<String>,
}

/// Executes requests against routing tables.
pub struct ProxyPipeline {
    client: Arc<dyn ModuleClient>,
    okapi_url: String,
    timeout: Duration,
}

impl ProxyPipeline {
    pub fn new(client: Arc<dyn ModuleClient>, okapi_url: impl Into<String>) -> Self {
        Self {
            client,
            okapi_url: okapi_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Per-call timeout.  Expiry is a downstream failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `request` (tenant and token already resolved) against `table`.
    pub async fn execute(
        &self,
        table: &RoutingTable,
        mut request: ProxyRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        let selector = headers::take_selector(&mut request.headers)?;
        headers::decorate(&mut request.headers, &self.okapi_url);
        let plan = ExecutionPlan::build(
            table,
            request.method.as_str(),
            &request.path,
            selector.as_ref(),
        )?;

        let mut run = Run::new(&request);
        let permissions = permission_headers(&plan.handlers);

        // FILTER_PRE, FILTER_AUTH
        let mut result: Option<ModuleResponse> = None;
        for route in plan.pre.iter().chain(&plan.auth) {
            let mut extra = filter_headers(route);
            if route.entry.phase == Some(Phase::Auth) {
                extra.extend(permissions.clone());
            }
            let response = self.call(&mut run, route, &request.path, extra).await?;
            if response.has_stop() {
                return Ok(run.finish(response));
            }
            if !response.is_success() {
                result = Some(response);
                break;
            }
            run.absorb(&response);
        }

        // HANDLE
        if result.is_none() {
            for step in &plan.handlers {
                let response = self
                    .call(&mut run, &step.route, &step.path, Headers::new())
                    .await?;
                if response.has_stop() {
                    return Ok(run.finish(response));
                }
                if !response.is_success() {
                    result = Some(response);
                    break;
                }
                run.forward(&response);
                match step.route.entry.proxy_type {
                    ProxyType::RequestResponse => {
                        run.body = response.body.clone();
                        result = Some(response);
                    }
                    ProxyType::Headers if result.is_some() => run.absorb(&response),
                    _ => result = Some(response),
                }
            }
        }

        let Some(response) = result else {
            return Err(PipelineError::new(
                GatewayError::internal(format!("No response for {}", request.path)),
                run.trace,
            ));
        };

        // FILTER_POST
        for route in &plan.post {
            let mut extra = filter_headers(route);
            extra.insert(HANDLER_RESULT.to_string(), response.status.to_string());
            match self.call(&mut run, route, &request.path, extra).await {
                Ok(post) if post.is_success() => run.absorb(&post),
                Ok(post) => warn!(
                    module = %route.module_id,
                    status = post.status,
                    "post filter failed"
                ),
                Err(err) => warn!(module = %route.module_id, error = %err, "post filter failed"),
            }
        }

        Ok(run.finish(response))
    }

    async fn call(
        &self,
        run: &mut Run,
        route: &CompiledRoute,
        path: &str,
        extra: Headers,
    ) -> Result<ModuleResponse, PipelineError> {
        let proxy_type = route.entry.proxy_type;
        let mut headers = run.headers.clone();
        headers.extend(extra);
        let call = ModuleCall {
            module_id: route.module_id.clone(),
            proxy_type,
            method: run.method,
            uri: match &run.query {
                Some(q) if !q.is_empty() => format!("{path}?{q}"),
                _ => path.to_string(),
            },
            headers,
            body: match proxy_type {
                ProxyType::Headers => Vec::new(),
                _ => run.body.clone(),
            },
        };
        debug!(module = %call.module_id, uri = %call.uri, kind = proxy_type.as_str(), "calling module");

        let outcome = match tokio::time::timeout(self.timeout, self.client.call(call)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };
        match outcome {
            Ok(response) => {
                run.trace
                    .push(format!("{} {}:{}", run.method, route.module_id, response.status));
                Ok(response)
            }
            Err(err) => Err(PipelineError::new(
                GatewayError::internal(format!(
                    "Module {} failed for {} {path}: {err}",
                    route.module_id, run.method
                )),
                run.trace.clone(),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-request state
// ─────────────────────────────────────────────────────────────────────────────

struct Run {
    method: HttpMethod,
    query: Option<String>,
    /// Sent to every module.
    headers: Headers,
    /// Input of the next step.
    body: Vec<u8>,
    /// Contributed by filters, added to the final response.
    response_headers: Headers,
    trace: Vec<String>,
}

impl Run {
    fn new(request: &ProxyRequest) -> Self {
        Self {
            method: request.method,
            query: request.query.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            response_headers: Headers::new(),
            trace: Vec::new(),
        }
    }

    /// Hand `x-okapi-*` headers of a response on to later steps.
    fn forward(&mut self, response: &ModuleResponse) {
        for (name, value) in &response.headers {
            if name.starts_with(names::OKAPI_PREFIX) && name != names::TRACE && name != names::STOP {
                self.headers.insert(name.clone(), value.clone());
            }
        }
    }

    /// Take over a filter response: `x-okapi-*` headers go to later steps,
    /// others to the final response.
    fn absorb(&mut self, response: &ModuleResponse) {
        self.forward(response);
        for (name, value) in &response.headers {
            if !name.starts_with(names::OKAPI_PREFIX) && !is_entity_header(name) {
                self.response_headers
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }

    fn finish(self, mut response: ModuleResponse) -> PipelineOutcome {
        for (name, value) in self.response_headers {
            response.headers.entry(name).or_insert(value);
        }
        PipelineOutcome {
            response,
            trace: self.trace,
        }
    }
}

fn is_entity_header(name: &str) -> bool {
    name.starts_with("content-") || matches!(name, "transfer-encoding" | "connection" | "date")
}

fn filter_headers(route: &CompiledRoute) -> Headers {
    let mut headers = Headers::new();
    headers.insert(names::FILTER.to_string(), route.filter_label());
    headers
}

/// Permission headers for auth filters, from the selected handlers.
fn permission_headers(handlers: &[HandlerStep]) -> Headers {
    let collect = |pick: fn(&CompiledRoute) -> Option<&Vec<String>>| {
        let mut all: Vec<String> = Vec::new();
        for step in handlers {
            for p in pick(&step.route).into_iter().flatten() {
                if !all.contains(p) {
                    all.push(p.clone());
                }
            }
        }
        all
    };
    let required = collect(|r| r.entry.permissions_required.as_ref());
    let desired = collect(|r| r.entry.permissions_desired.as_ref());
    let module = collect(|r| r.entry.module_permissions.as_ref());

    let mut headers = Headers::new();
    let json = |v: &Vec<String>| serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string());
    headers.insert(names::PERMISSIONS_REQUIRED.to_string(), json(&required));
    if !desired.is_empty() {
        headers.insert(names::PERMISSIONS_DESIRED.to_string(), json(&desired));
    }
    if !module.is_empty() {
        headers.insert(names::MODULE_PERMISSIONS.to_string(), json(&module));
    }
    headers
}
