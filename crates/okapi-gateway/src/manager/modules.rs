//! Module registry: validation, storage and compiled routes.

use crate::router::CompiledModule;
use dashmap::DashMap;
use okapi_kernel::{GatewayError, GatewayResult, ModuleDescriptor, ModuleId, ModuleStore};
use std::sync::Arc;
use tracing::info;

/// Registered modules and their compiled routing entries.
pub struct ModuleManager {
    store: Arc<dyn ModuleStore>,
    compiled: DashMap<ModuleId, Arc<CompiledModule>>,
}

impl ModuleManager {
    pub fn new(store: Arc<dyn ModuleStore>) -> Self {
        Self {
            store,
            compiled: DashMap::new(),
        }
    }

    /// Validate, compile and store `descriptor`.
    ///
    /// Re-registering an identical descriptor is a no-op; a different one
    /// under the same id is rejected.  With `check`, every required
    /// interface must be provided by some registered module.
    pub async fn register(
        &self,
        descriptor: ModuleDescriptor,
        check: bool,
    ) -> GatewayResult<ModuleDescriptor> {
        descriptor.validate()?;
        let compiled = CompiledModule::compile(descriptor.clone())?;

        if let Some(existing) = self.store.get(&descriptor.id).await? {
            if existing == descriptor {
                return Ok(existing);
            }
            return Err(GatewayError::user(format!(
                "Module {} already exists with a different descriptor",
                descriptor.id
            )));
        }

        if check {
            let registered = self.store.list().await?;
            for required in &descriptor.requires {
                let provided = registered
                    .iter()
                    .chain(std::iter::once(&descriptor))
                    .any(|m| m.satisfies(required));
                if !provided {
                    return Err(GatewayError::user(format!(
                        "Missing dependency: {} requires {required}",
                        descriptor.id
                    )));
                }
            }
        }

        self.store.insert(descriptor.clone()).await?;
        self.compiled
            .insert(descriptor.id.clone(), Arc::new(compiled));
        info!(module = %descriptor.id, "module registered");
        Ok(descriptor)
    }

    pub async fn get(&self, id: &ModuleId) -> GatewayResult<ModuleDescriptor> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("Module {id} not found")))
    }

    /// All modules, sorted by id.
    pub async fn list(&self) -> GatewayResult<Vec<ModuleDescriptor>> {
        let mut all = self.store.list().await?;
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    /// Remove a module.  Callers check that no tenant uses it.
    pub async fn remove(&self, id: &ModuleId) -> GatewayResult<()> {
        if !self.store.delete(id).await? {
            return Err(GatewayError::not_found(format!("Module {id} not found")));
        }
        self.compiled.remove(id);
        info!(module = %id, "module removed");
        Ok(())
    }

    /// Compiled routes of a registered module.
    pub async fn compiled(&self, id: &ModuleId) -> GatewayResult<Arc<CompiledModule>> {
        if let Some(hit) = self.compiled.get(id) {
            return Ok(Arc::clone(hit.value()));
        }
        let compiled = Arc::new(CompiledModule::compile(self.get(id).await?)?);
        self.compiled.insert(id.clone(), Arc::clone(&compiled));
        Ok(compiled)
    }
}
