use super::*;
use crate::store::{InMemoryModuleStore, InMemoryTenantStore};
use async_trait::async_trait;
use okapi_kernel::{ErrorType, InterfaceDescriptor, ModuleDescriptor, RoutingEntry};
use parking_lot::Mutex as SyncMutex;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::oneshot;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Records deployments; fails for the products listed in `broken`.
#[derive(Default)]
struct RecordingDeployer {
    running: SyncMutex<BTreeSet<String>>,
    log: SyncMutex<Vec<String>>,
    broken: BTreeSet<String>,
}

impl RecordingDeployer {
    fn failing(product: &str) -> Self {
        Self {
            broken: [product.to_string()].into(),
            ..Self::default()
        }
    }

    fn running(&self) -> Vec<String> {
        self.running.lock().iter().cloned().collect()
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl Deployer for RecordingDeployer {
    async fn deploy(&self, descriptor: &ModuleDescriptor) -> GatewayResult<()> {
        if self.broken.contains(descriptor.product()) {
            return Err(GatewayError::internal("launch failed"));
        }
        self.log.lock().push(format!("deploy {}", descriptor.id));
        self.running.lock().insert(descriptor.id.to_string());
        Ok(())
    }

    async fn undeploy(&self, id: &ModuleId) -> GatewayResult<()> {
        self.log.lock().push(format!("undeploy {id}"));
        self.running.lock().remove(id.as_str());
        Ok(())
    }
}

/// Tenant store that can pause the next enablement read and fail writes.
#[derive(Default)]
struct ControlledStore {
    inner: InMemoryTenantStore,
    gate: SyncMutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    reject_writes: bool,
}

impl ControlledStore {
    fn rejecting_writes() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }

    /// Pause the next enablement read.  The first receiver fires once the
    /// read happened; the reader resumes when the returned sender fires.
    fn pause_next_read(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock() = Some((reached_tx, release_rx));
        (reached_rx, release_tx)
    }
}

#[async_trait]
impl TenantStore for ControlledStore {
    async fn insert(&self, tenant: TenantDescriptor) -> GatewayResult<()> {
        self.inner.insert(tenant).await
    }

    async fn get(&self, id: &str) -> GatewayResult<Option<TenantDescriptor>> {
        self.inner.get(id).await
    }

    async fn list(&self) -> GatewayResult<Vec<TenantDescriptor>> {
        self.inner.list().await
    }

    async fn delete(&self, id: &str) -> GatewayResult<bool> {
        self.inner.delete(id).await
    }

    async fn enablement(&self, tenant: &str) -> GatewayResult<TenantEnablement> {
        let read = self.inner.enablement(tenant).await;
        let gate = self.gate.lock().take();
        if let Some((reached, release)) = gate {
            let _ = reached.send(());
            let _ = release.await;
        }
        read
    }

    async fn set_enablement(&self, enablement: TenantEnablement) -> GatewayResult<()> {
        if self.reject_writes {
            return Err(GatewayError::internal("store unavailable"));
        }
        self.inner.set_enablement(enablement).await
    }
}

fn id(s: &str) -> ModuleId {
    ModuleId::parse(s).unwrap()
}

fn module(name: &str, provides: &str, requires: Option<&str>) -> ModuleDescriptor {
    let md = ModuleDescriptor::new(id(name)).with_provides(
        InterfaceDescriptor::new(provides, "1.0")
            .with_handler(RoutingEntry::handler(&["GET"], format!("/{provides}"))),
    );
    match requires {
        Some(iface) => md.with_requires(iface, "1.0"),
        None => md,
    }
}

async fn setup(deployer: Arc<RecordingDeployer>) -> TenantManager {
    setup_with(Arc::new(InMemoryTenantStore::new()), deployer).await
}

async fn setup_with(store: Arc<dyn TenantStore>, deployer: Arc<RecordingDeployer>) -> TenantManager {
    let modules = Arc::new(ModuleManager::new(Arc::new(InMemoryModuleStore::new())));
    modules.register(module("basic-module-1.0.0", "bint", None), false).await.unwrap();
    modules
        .register(module("sample-module-1.2.0", "sample", Some("bint")), false)
        .await
        .unwrap();
    let manager = TenantManager::new(store, modules, deployer);
    manager.create(TenantDescriptor::new("diku")).await.unwrap();
    manager
}

fn deploying() -> InstallOptions {
    InstallOptions::default().with_deploy(true)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn simulate_changes_nothing() {
    let deployer = Arc::new(RecordingDeployer::default());
    let manager = setup(deployer.clone()).await;
    let request = [TenantModuleRequest::enable(id("sample-module"))];

    let first = manager
        .install("diku", &request, InstallOptions::simulate())
        .await
        .unwrap();
    let second = manager
        .install("diku", &request, InstallOptions::simulate())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(manager.enabled("diku").await.unwrap().is_empty());
    assert!(manager.snapshot("diku").await.unwrap().table.is_empty());
    assert!(deployer.log().is_empty());
}

#[tokio::test]
async fn install_commits_and_swaps_snapshot() {
    let deployer = Arc::new(RecordingDeployer::default());
    let manager = setup(deployer.clone()).await;
    let before = manager.snapshot("diku").await.unwrap();

    manager
        .install("diku", &[TenantModuleRequest::enable(id("sample-module"))], deploying())
        .await
        .unwrap();

    assert_eq!(
        manager.enabled("diku").await.unwrap(),
        [id("basic-module-1.0.0"), id("sample-module-1.2.0")]
    );
    let after = manager.snapshot("diku").await.unwrap();
    assert!(before.table.is_empty());
    assert_eq!(after.table.len(), 2);
    assert_eq!(after.catalog.providers("bint").len(), 1);
    assert_eq!(
        deployer.log(),
        ["deploy basic-module-1.0.0", "deploy sample-module-1.2.0"]
    );
}

#[tokio::test]
async fn failed_deploy_rolls_back() {
    let deployer = Arc::new(RecordingDeployer::failing("sample-module"));
    let manager = setup(deployer.clone()).await;

    let err = manager
        .install("diku", &[TenantModuleRequest::enable(id("sample-module"))], deploying())
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Internal);
    assert!(err.message().contains("sample-module-1.2.0"));
    assert!(manager.enabled("diku").await.unwrap().is_empty());
    assert!(deployer.running().is_empty());
    assert_eq!(
        deployer.log(),
        ["deploy basic-module-1.0.0", "undeploy basic-module-1.0.0"]
    );
}

#[tokio::test]
async fn shared_modules_stay_deployed() {
    let deployer = Arc::new(RecordingDeployer::default());
    let manager = setup(deployer.clone()).await;
    manager.create(TenantDescriptor::new("other")).await.unwrap();
    let enable = [TenantModuleRequest::enable(id("basic-module"))];
    manager.install("diku", &enable, deploying()).await.unwrap();
    manager.install("other", &enable, deploying()).await.unwrap();
    assert_eq!(deployer.log(), ["deploy basic-module-1.0.0"]);

    let disable = [TenantModuleRequest::disable(id("basic-module"))];
    manager.install("diku", &disable, deploying()).await.unwrap();
    assert_eq!(deployer.running(), ["basic-module-1.0.0"]);

    manager.delete("other").await.unwrap();
    assert!(deployer.running().is_empty());
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let manager = setup(Arc::new(RecordingDeployer::default())).await;
    let err = manager.snapshot("nobody").await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::NotFound);
    let err = manager
        .install("nobody", &[], InstallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::NotFound);
}

#[tokio::test]
async fn tenant_ids_are_validated_and_unique() {
    let manager = setup(Arc::new(RecordingDeployer::default())).await;
    let err = manager.create(TenantDescriptor::new("diku")).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::User);
    let err = manager.create(TenantDescriptor::new("1bad-id")).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::User);
}

#[tokio::test]
async fn modules_in_use_cannot_be_deleted() {
    let manager = setup(Arc::new(RecordingDeployer::default())).await;
    manager
        .enable_module("diku", id("basic-module"), InstallOptions::default())
        .await
        .unwrap();
    assert_eq!(
        manager.tenants_using(&id("basic-module-1.0.0")).await.unwrap(),
        ["diku"]
    );
    let err = manager.delete_module(&id("basic-module-1.0.0")).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::User);

    manager
        .disable_module("diku", id("basic-module"), InstallOptions::default())
        .await
        .unwrap();
    manager.delete_module(&id("basic-module-1.0.0")).await.unwrap();
    assert_eq!(manager.modules().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn enable_module_reports_resolved_id() {
    let manager = setup(Arc::new(RecordingDeployer::default())).await;
    let enabled = manager
        .enable_module("diku", id("sample-module"), InstallOptions::default())
        .await
        .unwrap();
    assert_eq!(enabled, id("sample-module-1.2.0"));
}

#[tokio::test]
async fn upgrade_moves_to_latest() {
    let manager = setup(Arc::new(RecordingDeployer::default())).await;
    manager
        .install(
            "diku",
            &[TenantModuleRequest::enable(id("basic-module-1.0.0"))],
            InstallOptions::default(),
        )
        .await
        .unwrap();
    manager
        .modules()
        .register(module("basic-module-1.1.0", "bint", None), false)
        .await
        .unwrap();

    let plan = manager.upgrade("diku", InstallOptions::default()).await.unwrap();
    assert_eq!(
        plan,
        [InstallAction::new(id("basic-module-1.1.0"), Action::Enable)
            .with_from(id("basic-module-1.0.0"))]
    );
    assert_eq!(
        manager.enabled("diku").await.unwrap(),
        [id("basic-module-1.1.0")]
    );
}

#[tokio::test]
async fn failed_persist_undeploys_batch() {
    let deployer = Arc::new(RecordingDeployer::default());
    let store = Arc::new(ControlledStore::rejecting_writes());
    let manager = setup_with(store, deployer.clone()).await;

    let err = manager
        .install("diku", &[TenantModuleRequest::enable(id("sample-module"))], deploying())
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Internal);
    assert!(manager.enabled("diku").await.unwrap().is_empty());
    assert!(manager.snapshot("diku").await.unwrap().table.is_empty());
    assert!(deployer.running().is_empty());
    assert_eq!(
        deployer.log(),
        [
            "deploy basic-module-1.0.0",
            "deploy sample-module-1.2.0",
            "undeploy sample-module-1.2.0",
            "undeploy basic-module-1.0.0"
        ]
    );
}

#[tokio::test]
async fn cold_snapshot_never_overwrites_a_commit() {
    let store = Arc::new(ControlledStore::default());
    let manager = Arc::new(setup_with(store.clone(), Arc::new(RecordingDeployer::default())).await);
    let (reached, release) = store.pause_next_read();

    let reader = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.snapshot("diku").await }
    });
    reached.await.unwrap();

    let installer = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .install(
                    "diku",
                    &[TenantModuleRequest::enable(id("basic-module-1.0.0"))],
                    InstallOptions::default(),
                )
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.send(()).unwrap();

    let cold = reader.await.unwrap().unwrap();
    installer.await.unwrap().unwrap();
    assert!(cold.enabled.is_empty());
    let current = manager.snapshot("diku").await.unwrap();
    assert_eq!(current.enabled, [id("basic-module-1.0.0")]);
    assert_eq!(current.table.len(), 1);
}

#[tokio::test]
async fn locks_exist_only_for_live_tenants() {
    let manager = setup(Arc::new(RecordingDeployer::default())).await;
    assert!(manager.snapshot("nobody").await.is_err());
    assert!(manager.install("nobody", &[], InstallOptions::default()).await.is_err());
    assert!(manager.upgrade("nobody", InstallOptions::default()).await.is_err());
    assert!(manager.delete("nobody").await.is_err());
    assert!(!manager.locks.contains_key("nobody"));

    manager.snapshot("diku").await.unwrap();
    manager.delete("diku").await.unwrap();
    assert!(manager.locks.is_empty());
    assert!(manager.snapshot("diku").await.is_err());
}
