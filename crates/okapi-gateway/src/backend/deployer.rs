//! [`Deployer`] that publishes instances to [`Discovery`].
//!
//! There is no process launcher: "deploying" means making the URL from the
//! module's `launchDescriptor` (`{"url": "http://…"}`) discoverable.
//! Modules that already have an instance (statically configured, or
//! deployed for another tenant) are left alone.

use super::discovery::{Discovery, InstanceOrigin};
use async_trait::async_trait;
use okapi_kernel::{Deployer, GatewayError, GatewayResult, ModuleDescriptor, ModuleId};
use std::sync::Arc;
use tracing::info;

pub struct DiscoveryDeployer {
    discovery: Arc<Discovery>,
}

impl DiscoveryDeployer {
    pub fn new(discovery: Arc<Discovery>) -> Self {
        Self { discovery }
    }
}

#[async_trait]
impl Deployer for DiscoveryDeployer {
    async fn deploy(&self, descriptor: &ModuleDescriptor) -> GatewayResult<()> {
        if self.discovery.url_for(&descriptor.id).is_some() {
            return Ok(());
        }
        let url = descriptor
            .launch_descriptor
            .as_ref()
            .and_then(|launch| launch.get("url"))
            .and_then(|url| url.as_str())
            .ok_or_else(|| {
                GatewayError::internal(format!(
                    "Module {} has no instance and no launchDescriptor url",
                    descriptor.id
                ))
            })?;
        self.discovery
            .register(descriptor.id.as_str(), url, InstanceOrigin::Deployed);
        info!(module = %descriptor.id, url, "module deployed");
        Ok(())
    }

    async fn undeploy(&self, id: &ModuleId) -> GatewayResult<()> {
        if self.discovery.undeploy(id.as_str()) {
            info!(module = %id, "module undeployed");
        }
        Ok(())
    }
}
