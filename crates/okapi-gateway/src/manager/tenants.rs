//! Tenants, their enablement and the install commit.
//!
//! Every tenant has an immutable [`TenantSnapshot`] (enabled modules,
//! interface catalog, routing table) published behind an `Arc`.  Requests
//! clone the `Arc` and never wait for installs.  Installs for one tenant
//! are serialised on a per-tenant async mutex; different tenants proceed
//! in parallel.
//!
//! Commit order:
//!
//! ```text
//! resolve ──► deploy new modules ──► build snapshot ──► persist ──► swap ──► undeploy unused
//!               │ failure                 │ failure
//!               ▼                         ▼
//!          undeploy this batch      undeploy this batch
//! ```
//!
//! A snapshot missing from the cache is built under the tenant lock, so a
//! request can never publish routing older than a concurrent commit.

use super::modules::ModuleManager;
use crate::catalog::InterfaceCatalog;
use crate::resolver::DependencyResolver;
use crate::router::RoutingTable;
use dashmap::DashMap;
use futures::future::join_all;
use okapi_kernel::{
    Action, Deployer, GatewayError, GatewayResult, InstallAction, InstallOptions,
    ModuleDescriptor, ModuleId, TenantDescriptor, TenantEnablement, TenantModuleRequest, TenantStore,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Everything the proxy needs about one tenant, frozen.
#[derive(Debug, Clone)]
pub struct TenantSnapshot {
    pub tenant: TenantDescriptor,
    pub enabled: Vec<ModuleId>,
    pub descriptors: Vec<Arc<ModuleDescriptor>>,
    pub catalog: InterfaceCatalog,
    pub table: RoutingTable,
}

pub struct TenantManager {
    store: Arc<dyn TenantStore>,
    modules: Arc<ModuleManager>,
    deployer: Arc<dyn Deployer>,
    snapshots: DashMap<String, Arc<TenantSnapshot>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TenantManager {
    pub fn new(
        store: Arc<dyn TenantStore>,
        modules: Arc<ModuleManager>,
        deployer: Arc<dyn Deployer>,
    ) -> Self {
        Self {
            store,
            modules,
            deployer,
            snapshots: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn modules(&self) -> &Arc<ModuleManager> {
        &self.modules
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tenants
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create(&self, tenant: TenantDescriptor) -> GatewayResult<TenantDescriptor> {
        tenant.validate().map_err(GatewayError::user)?;
        let _guard = self.acquire(&tenant.id).await;
        if self.store.get(&tenant.id).await?.is_some() {
            return Err(GatewayError::user(format!(
                "Tenant {} already exists",
                tenant.id
            )));
        }
        self.store.insert(tenant.clone()).await?;
        info!(tenant = %tenant.id, "tenant created");
        Ok(tenant)
    }

    pub async fn get(&self, id: &str) -> GatewayResult<TenantDescriptor> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("Tenant {id} not found")))
    }

    pub async fn list(&self) -> GatewayResult<Vec<TenantDescriptor>> {
        let mut all = self.store.list().await?;
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    /// Remove a tenant with its enablement; modules no other tenant uses
    /// are undeployed.
    pub async fn delete(&self, id: &str) -> GatewayResult<()> {
        let (_guard, _) = self.lock_tenant(id).await?;
        let enabled = self.store.enablement(id).await?.modules;
        if !self.store.delete(id).await? {
            return Err(GatewayError::not_found(format!("Tenant {id} not found")));
        }
        self.snapshots.remove(id);
        self.locks.remove(id);
        self.undeploy_unused(&enabled).await;
        info!(tenant = %id, "tenant deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Current snapshot of `id`, built on first use.
    pub async fn snapshot(&self, id: &str) -> GatewayResult<Arc<TenantSnapshot>> {
        if let Some(hit) = self.snapshots.get(id) {
            return Ok(Arc::clone(hit.value()));
        }
        let (_guard, tenant) = self.lock_tenant(id).await?;
        if let Some(hit) = self.snapshots.get(id) {
            return Ok(Arc::clone(hit.value()));
        }
        let enabled = self.store.enablement(id).await?.modules;
        let snapshot = Arc::new(self.build_snapshot(tenant, enabled).await?);
        self.snapshots.insert(id.to_string(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn build_snapshot(
        &self,
        tenant: TenantDescriptor,
        enabled: Vec<ModuleId>,
    ) -> GatewayResult<TenantSnapshot> {
        let mut compiled = Vec::with_capacity(enabled.len());
        for id in &enabled {
            compiled.push(self.modules.compiled(id).await?);
        }
        Ok(TenantSnapshot {
            catalog: InterfaceCatalog::build(compiled.iter().map(|c| c.descriptor.as_ref())),
            table: RoutingTable::build(compiled.iter().map(Arc::as_ref)),
            descriptors: compiled.iter().map(|c| Arc::clone(&c.descriptor)).collect(),
            tenant,
            enabled,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enablement
    // ─────────────────────────────────────────────────────────────────────────

    /// Modules enabled for `id`, in enablement order.
    pub async fn enabled(&self, id: &str) -> GatewayResult<Vec<ModuleId>> {
        self.get(id).await?;
        Ok(self.store.enablement(id).await?.modules)
    }

    /// Plan `requests` and, unless simulating, commit the plan.
    pub async fn install(
        &self,
        id: &str,
        requests: &[TenantModuleRequest],
        options: InstallOptions,
    ) -> GatewayResult<Vec<InstallAction>> {
        let (_guard, tenant) = self.lock_tenant(id).await?;
        let enablement = self.store.enablement(id).await?;
        self.plan_and_commit(tenant, enablement, |_| requests.to_vec(), options)
            .await
    }

    /// Move every enabled product to its latest acceptable version.
    pub async fn upgrade(
        &self,
        id: &str,
        options: InstallOptions,
    ) -> GatewayResult<Vec<InstallAction>> {
        let (_guard, tenant) = self.lock_tenant(id).await?;
        let enablement = self.store.enablement(id).await?;
        self.plan_and_commit(tenant, enablement, DependencyResolver::upgrade_requests, options)
            .await
    }

    /// Enable one module (id or product) and return the enabled id.
    pub async fn enable_module(
        &self,
        id: &str,
        module: ModuleId,
        options: InstallOptions,
    ) -> GatewayResult<ModuleId> {
        let product = module.product().to_string();
        let plan = self
            .install(id, &[TenantModuleRequest::enable(module)], options)
            .await?;
        plan.into_iter()
            .rev()
            .find(|step| step.action != Action::Disable && step.id.product() == product)
            .map(|step| step.id)
            .ok_or_else(|| GatewayError::internal(format!("No module of {product} enabled")))
    }

    /// Disable one enabled module.
    pub async fn disable_module(
        &self,
        id: &str,
        module: ModuleId,
        options: InstallOptions,
    ) -> GatewayResult<()> {
        self.install(id, &[TenantModuleRequest::disable(module)], options)
            .await
            .map(|_| ())
    }

    /// Tenants that have `module` enabled.
    pub async fn tenants_using(&self, module: &ModuleId) -> GatewayResult<Vec<String>> {
        let tenants = self.store.list().await?;
        let enablements = join_all(tenants.iter().map(|t| self.store.enablement(&t.id))).await;
        let mut using = Vec::new();
        for (tenant, enablement) in tenants.iter().zip(enablements) {
            if enablement?.is_enabled(module) {
                using.push(tenant.id.clone());
            }
        }
        Ok(using)
    }

    /// Delete a module no tenant has enabled.
    pub async fn delete_module(&self, module: &ModuleId) -> GatewayResult<()> {
        let using = self.tenants_using(module).await?;
        if !using.is_empty() {
            return Err(GatewayError::user(format!(
                "Module {module} is in use by tenants: {}",
                using.join(", ")
            )));
        }
        self.modules.remove(module).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit
    // ─────────────────────────────────────────────────────────────────────────

    /// Take the per-tenant lock.  Retries when the lock was replaced while
    /// waiting, which happens when the tenant is deleted and re-created.
    async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        loop {
            let lock = Arc::clone(self.locks.entry(id.to_string()).or_default().value());
            let guard = Arc::clone(&lock).lock_owned().await;
            let current = self
                .locks
                .get(id)
                .is_some_and(|entry| Arc::ptr_eq(entry.value(), &lock));
            if current {
                return guard;
            }
        }
    }

    /// Lock an existing tenant and read it again under the lock.  Unknown
    /// tenants never get a lock entry.
    async fn lock_tenant(
        &self,
        id: &str,
    ) -> GatewayResult<(OwnedMutexGuard<()>, TenantDescriptor)> {
        self.get(id).await?;
        let guard = self.acquire(id).await;
        let tenant = self.get(id).await?;
        Ok((guard, tenant))
    }

    async fn plan_and_commit(
        &self,
        tenant: TenantDescriptor,
        enablement: TenantEnablement,
        requests: impl FnOnce(&[ModuleId]) -> Vec<TenantModuleRequest>,
        options: InstallOptions,
    ) -> GatewayResult<Vec<InstallAction>> {
        let catalog = self.modules.list().await?;
        let requests = requests(&enablement.modules);
        let plan = DependencyResolver::new(&catalog, options).resolve(&enablement.modules, &requests)?;
        if options.simulate {
            return Ok(plan);
        }
        self.commit(tenant, enablement, &plan, options).await?;
        Ok(plan)
    }

    async fn commit(
        &self,
        tenant: TenantDescriptor,
        enablement: TenantEnablement,
        plan: &[InstallAction],
        options: InstallOptions,
    ) -> GatewayResult<()> {
        let deployed = if options.deploy {
            self.deploy_batch(plan).await?
        } else {
            Vec::new()
        };

        let mut next = enablement;
        next.apply(plan);
        let tenant_id = tenant.id.clone();
        let persisted = match self.build_snapshot(tenant, next.modules.clone()).await {
            Ok(snapshot) => self.store.set_enablement(next).await.map(|()| snapshot),
            Err(err) => Err(err),
        };
        let snapshot = match persisted {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.rollback(&deployed).await;
                return Err(err);
            }
        };
        self.snapshots.insert(tenant_id.clone(), Arc::new(snapshot));
        info!(tenant = %tenant_id, steps = plan.len(), "install committed");

        if options.deploy {
            let removed: Vec<ModuleId> = plan
                .iter()
                .filter_map(|step| match step.action {
                    Action::Disable => Some(step.id.clone()),
                    _ => step.from.clone(),
                })
                .collect();
            self.undeploy_unused(&removed).await;
        }
        Ok(())
    }

    /// Deploy the modules this plan enables that no tenant runs yet and
    /// return them.  On failure the ones deployed so far are undeployed
    /// again.
    async fn deploy_batch(&self, plan: &[InstallAction]) -> GatewayResult<Vec<ModuleId>> {
        let mut deployed: Vec<ModuleId> = Vec::new();
        for step in plan.iter().filter(|s| s.action == Action::Enable) {
            if !self.tenants_using(&step.id).await?.is_empty() {
                continue;
            }
            let outcome = match self.modules.get(&step.id).await {
                Ok(descriptor) => self.deployer.deploy(&descriptor).await,
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                self.rollback(&deployed).await;
                return Err(err.context(format!("Deploying {}", step.id)));
            }
            deployed.push(step.id.clone());
        }
        Ok(deployed)
    }

    async fn rollback(&self, deployed: &[ModuleId]) {
        for id in deployed.iter().rev() {
            if let Err(undo) = self.deployer.undeploy(id).await {
                warn!(module = %id, error = %undo, "rollback undeploy failed");
            }
        }
    }

    async fn undeploy_unused(&self, modules: &[ModuleId]) {
        for id in modules {
            match self.tenants_using(id).await {
                Ok(using) if using.is_empty() => {
                    if let Err(err) = self.deployer.undeploy(id).await {
                        warn!(module = %id, error = %err, "undeploy failed");
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(module = %id, error = %err, "usage check failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests;
