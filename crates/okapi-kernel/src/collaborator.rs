//! Narrow contracts for everything the gateway core treats as a black box:
//! persistence, deployment and the transport to module instances.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ install planner          proxy pipeline      │
//! └──────┬────────────┬──────────────┬───────────┘
//!        │            │              │
//!   ModuleStore   Deployer      ModuleClient
//!   TenantStore
//! ```
//!
//! Implementations must be `Send + Sync`; the runtime shares them behind
//! `Arc<dyn …>`.

use crate::error::GatewayResult;
use crate::module::ModuleDescriptor;
use crate::proxy::{ModuleCall, ModuleResponse};
use crate::tenant::{TenantDescriptor, TenantEnablement};
use crate::version::ModuleId;
use async_trait::async_trait;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Storage of registered module descriptors.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Insert or overwrite a descriptor.
    async fn insert(&self, descriptor: ModuleDescriptor) -> GatewayResult<()>;

    async fn get(&self, id: &ModuleId) -> GatewayResult<Option<ModuleDescriptor>>;

    /// All descriptors, in no particular order.
    async fn list(&self) -> GatewayResult<Vec<ModuleDescriptor>>;

    /// Remove a descriptor.  Returns whether it existed.
    async fn delete(&self, id: &ModuleId) -> GatewayResult<bool>;
}

/// Storage of tenants and their enablement.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Insert or overwrite a tenant.
    async fn insert(&self, tenant: TenantDescriptor) -> GatewayResult<()>;

    async fn get(&self, id: &str) -> GatewayResult<Option<TenantDescriptor>>;

    async fn list(&self) -> GatewayResult<Vec<TenantDescriptor>>;

    /// Remove a tenant together with its enablement.  Returns whether it
    /// existed.
    async fn delete(&self, id: &str) -> GatewayResult<bool>;

    /// Enabled modules of `tenant`; empty when none were ever stored.
    async fn enablement(&self, tenant: &str) -> GatewayResult<TenantEnablement>;

    async fn set_enablement(&self, enablement: TenantEnablement) -> GatewayResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Deployment
// ─────────────────────────────────────────────────────────────────────────────

/// Starts and stops module instances.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Make an instance of `descriptor` reachable.  Deploying an already
    /// deployed module is a no-op.
    async fn deploy(&self, descriptor: &ModuleDescriptor) -> GatewayResult<()>;

    /// Stop the instance of `id`.
    async fn undeploy(&self, id: &ModuleId) -> GatewayResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Failure to obtain any response from a module.
///
/// Non-2xx answers are *responses*, not transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    #[error("no running instance")]
    NoInstance,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

/// Sends one call to the instance of a module.
#[async_trait]
pub trait ModuleClient: Send + Sync {
    async fn call(&self, call: ModuleCall) -> Result<ModuleResponse, TransportError>;
}
