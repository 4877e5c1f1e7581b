//! Shared application state for the admin API and the proxy

use crate::backend::{Discovery, DiscoveryDeployer};
use crate::manager::{ModuleManager, TenantManager};
use crate::pipeline::ProxyPipeline;
use crate::store::{InMemoryModuleStore, InMemoryTenantStore};
use okapi_kernel::ModuleClient;
use okapi_kernel::config::GatewayConfig;
use std::sync::Arc;
use std::time::Duration;

/// State shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Module registry
    pub modules: Arc<ModuleManager>,
    /// Tenants, their enablement and snapshots
    pub tenants: Arc<TenantManager>,
    /// Known module instances
    pub discovery: Arc<Discovery>,
    /// Request pipeline for every non-admin path
    pub pipeline: Arc<ProxyPipeline>,
}

impl AppState {
    pub fn new(
        tenants: Arc<TenantManager>,
        discovery: Arc<Discovery>,
        pipeline: Arc<ProxyPipeline>,
    ) -> Self {
        Self {
            modules: Arc::clone(tenants.modules()),
            tenants,
            discovery,
            pipeline,
        }
    }

    /// In-memory stores and a discovery-backed deployer around `client`.
    pub fn in_memory(
        config: &GatewayConfig,
        discovery: Arc<Discovery>,
        client: Arc<dyn ModuleClient>,
    ) -> Self {
        let modules = Arc::new(ModuleManager::new(Arc::new(InMemoryModuleStore::new())));
        let tenants = Arc::new(TenantManager::new(
            Arc::new(InMemoryTenantStore::new()),
            modules,
            Arc::new(DiscoveryDeployer::new(Arc::clone(&discovery))),
        ));
        let pipeline = ProxyPipeline::new(client, config.okapi_url.clone())
            .with_timeout(Duration::from_millis(config.request_timeout_ms));
        Self::new(tenants, discovery, Arc::new(pipeline))
    }
}
