//! Okapi kernel: the data model and contracts of the module gateway.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              okapi-kernel  (this crate)                     │
//! │  SemVer  ModuleId  InterfaceVersion                         │
//! │  ModuleDescriptor  RoutingEntry  TenantEnablement           │
//! │  InstallAction  GatewayError  GatewayConfig                 │
//! │  ModuleStore / TenantStore / Deployer / ModuleClient traits │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │              okapi-gateway  (runtime crate)                 │
//! │  InterfaceCatalog  DependencyResolver  TenantManager        │
//! │  RoutingTable  ProxyPipeline  axum admin + proxy server     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate performs I/O except configuration loading.

// version identities
pub mod version;

// module descriptors
pub mod module;

// tenants and install batches
pub mod tenant;

// proxy request/response values
pub mod proxy;

// collaborator traits
pub mod collaborator;

// error module
pub mod error;

// configuration
pub mod config;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use collaborator::{Deployer, ModuleClient, ModuleStore, TenantStore, TransportError};
pub use error::{ErrorType, GatewayError, GatewayResult};
pub use module::{
    InterfaceDescriptor, InterfaceReference, InterfaceType, ModuleDescriptor, Phase, ProxyType,
    RoutingEntry,
};
pub use proxy::{Headers, HttpMethod, ModuleCall, ModuleResponse, ProxyRequest};
pub use tenant::{
    Action, InstallAction, InstallOptions, TenantDescriptor, TenantEnablement,
    TenantModuleRequest,
};
pub use version::{InterfaceVersion, ModuleId, SemVer, VersionError};
