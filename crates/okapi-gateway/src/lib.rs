//! `okapi-gateway`: the runtime of the Okapi module gateway.
//!
//! This crate implements the contracts of `okapi-kernel`:
//!
//! | Kernel contract | Implementation |
//! |-----------------|----------------|
//! | [`ModuleStore`](okapi_kernel::ModuleStore) | [`store::InMemoryModuleStore`] |
//! | [`TenantStore`](okapi_kernel::TenantStore) | [`store::InMemoryTenantStore`] |
//! | [`Deployer`](okapi_kernel::Deployer) | [`backend::DiscoveryDeployer`] |
//! | [`ModuleClient`](okapi_kernel::ModuleClient) | [`backend::HttpModuleClient`] |
//!
//! On top of these sit the [`resolver::DependencyResolver`] (install
//! plans), the [`manager`] registries with the install commit, the
//! [`router::RoutingTable`] and the [`pipeline::ProxyPipeline`].  The
//! [`server::GatewayServer`] serves the admin API and the proxy with axum.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use okapi_gateway::server::GatewayServer;
//! use okapi_kernel::config::GatewayConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::default()
//!         .with_port(9130)
//!         .with_instance("mod-users", "http://localhost:8081");
//!     GatewayServer::new(config).start().await
//! }
//! ```

pub mod backend;
pub mod catalog;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod pipeline;
pub mod resolver;
pub mod router;
pub mod server;
pub mod state;
pub mod store;

// Re-export the kernel for convenience.
pub use okapi_kernel as kernel;
