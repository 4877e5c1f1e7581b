//! In-memory [`ModuleStore`] and [`TenantStore`].
//!
//! Suitable for single-node deployments and tests.  State is lost on
//! restart.

use async_trait::async_trait;
use okapi_kernel::{
    GatewayResult, ModuleDescriptor, ModuleId, ModuleStore, TenantDescriptor, TenantEnablement,
    TenantStore,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// [`ModuleStore`] backed by a `BTreeMap`.
#[derive(Default)]
pub struct InMemoryModuleStore {
    modules: RwLock<BTreeMap<ModuleId, ModuleDescriptor>>,
}

impl InMemoryModuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn insert(&self, descriptor: ModuleDescriptor) -> GatewayResult<()> {
        self.modules.write().insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    async fn get(&self, id: &ModuleId) -> GatewayResult<Option<ModuleDescriptor>> {
        Ok(self.modules.read().get(id).cloned())
    }

    async fn list(&self) -> GatewayResult<Vec<ModuleDescriptor>> {
        Ok(self.modules.read().values().cloned().collect())
    }

    async fn delete(&self, id: &ModuleId) -> GatewayResult<bool> {
        Ok(self.modules.write().remove(id).is_some())
    }
}

/// [`TenantStore`] backed by two `BTreeMap`s.
#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<BTreeMap<String, TenantDescriptor>>,
    enablement: RwLock<BTreeMap<String, TenantEnablement>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn insert(&self, tenant: TenantDescriptor) -> GatewayResult<()> {
        self.tenants.write().insert(tenant.id.clone(), tenant);
        Ok(())
    }

    async fn get(&self, id: &str) -> GatewayResult<Option<TenantDescriptor>> {
        Ok(self.tenants.read().get(id).cloned())
    }

    async fn list(&self) -> GatewayResult<Vec<TenantDescriptor>> {
        Ok(self.tenants.read().values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> GatewayResult<bool> {
        self.enablement.write().remove(id);
        Ok(self.tenants.write().remove(id).is_some())
    }

    async fn enablement(&self, tenant: &str) -> GatewayResult<TenantEnablement> {
        Ok(self
            .enablement
            .read()
            .get(tenant)
            .cloned()
            .unwrap_or_else(|| TenantEnablement::new(tenant)))
    }

    async fn set_enablement(&self, enablement: TenantEnablement) -> GatewayResult<()> {
        self.enablement
            .write()
            .insert(enablement.tenant_id.clone(), enablement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn modules_round_trip_sorted() {
        let store = InMemoryModuleStore::new();
        store.insert(ModuleDescriptor::new(id("b-1.0.0"))).await.unwrap();
        store.insert(ModuleDescriptor::new(id("a-2.0.0"))).await.unwrap();
        store.insert(ModuleDescriptor::new(id("a-10.0.0"))).await.unwrap();

        let listed: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(listed, ["a-2.0.0", "a-10.0.0", "b-1.0.0"]);

        assert!(store.get(&id("a-2.0.0")).await.unwrap().is_some());
        assert!(store.delete(&id("a-2.0.0")).await.unwrap());
        assert!(!store.delete(&id("a-2.0.0")).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_tenant_drops_enablement() {
        let store = InMemoryTenantStore::new();
        store.insert(TenantDescriptor::new("diku")).await.unwrap();
        let mut enablement = TenantEnablement::new("diku");
        enablement.modules.push(id("a-1.0.0"));
        store.set_enablement(enablement.clone()).await.unwrap();
        assert_eq!(store.enablement("diku").await.unwrap(), enablement);

        assert!(store.delete("diku").await.unwrap());
        assert!(store.get("diku").await.unwrap().is_none());
        assert!(store.enablement("diku").await.unwrap().modules.is_empty());
    }
}
