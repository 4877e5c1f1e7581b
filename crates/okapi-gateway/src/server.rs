//! Axum-based HTTP gateway server.
//!
//! [`GatewayServer`] wires the registries, discovery and the proxy pipeline
//! into a running axum service.
//!
//! # Endpoints
//!
//! | Prefix | Description |
//! |--------|-------------|
//! | `/_/proxy/health` | Liveness check. |
//! | `/_/proxy/modules` | Module registry. |
//! | `/_/proxy/tenants` | Tenants, enabled modules, install and upgrade, interface queries. |
//! | `/_/discovery/modules` | Module instances. |
//! | anything else | Routed to the tenant's modules by the proxy pipeline. |

use crate::backend::{Discovery, HttpModuleClient};
use crate::handlers::{
    discovery_router, health_router, interfaces_router, modules_router, proxy, tenants_router,
};
use crate::state::AppState;
use axum::Router;
use okapi_kernel::GatewayResult;
use okapi_kernel::config::GatewayConfig;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Admin API prefix.
pub const PROXY_PREFIX: &str = "/_/proxy";
/// Discovery API prefix.
pub const DISCOVERY_PREFIX: &str = "/_/discovery";

/// Build the full router around `state`.
pub fn build_app(state: AppState) -> Router {
    let admin = Router::new()
        .merge(health_router())
        .merge(modules_router())
        .merge(tenants_router())
        .merge(interfaces_router());

    Router::new()
        .nest(PROXY_PREFIX, admin)
        .nest(DISCOVERY_PREFIX, discovery_router())
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayServer
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway process: in-memory registries, static plus deployed discovery
/// and the reqwest module client.
pub struct GatewayServer {
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Assemble the application state from the configuration.
    pub fn build_state(&self) -> GatewayResult<AppState> {
        let discovery = Arc::new(Discovery::with_static(&self.config.discovery));
        let client = HttpModuleClient::new(
            Arc::clone(&discovery),
            Duration::from_millis(self.config.request_timeout_ms),
        )?;
        Ok(AppState::in_memory(&self.config, discovery, Arc::new(client)))
    }

    /// Build the axum [`Router`].  Call [`start()`](Self::start) to bind and
    /// serve.
    pub fn build_app(&self) -> GatewayResult<Router> {
        Ok(build_app(self.build_state()?))
    }

    /// Bind the server to `0.0.0.0:{port}` and serve until the process exits.
    pub async fn start(self) -> anyhow::Result<()> {
        let app = self.build_app()?;
        let addr = format!("0.0.0.0:{}", self.config.port);
        info!(
            addr = %addr,
            okapi_url = %self.config.okapi_url,
            static_instances = self.config.discovery.len(),
            "Okapi gateway starting"
        );
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
