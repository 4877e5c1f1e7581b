//! Where module instances live.
//!
//! Instances are keyed by module id, or by product for statically
//! configured ones that should serve every version.  Environment overrides
//! arrive with `_` in place of `-`, so product lookups try that spelling
//! too.

use dashmap::DashMap;
use okapi_kernel::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// How an instance became known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceOrigin {
    /// From configuration or the discovery endpoint; survives undeploy.
    Static,
    /// Registered by the deployer.
    Deployed,
}

/// One reachable module instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Module id or product.
    pub srvc_id: String,
    pub url: String,
    pub origin: InstanceOrigin,
}

#[derive(Debug, Default)]
pub struct Discovery {
    instances: DashMap<String, Instance>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with static instances (`module id or product → base URL`).
    pub fn with_static(entries: &BTreeMap<String, String>) -> Self {
        let discovery = Self::new();
        for (srvc_id, url) in entries {
            discovery.register(srvc_id, url, InstanceOrigin::Static);
        }
        discovery
    }

    pub fn register(&self, srvc_id: &str, url: &str, origin: InstanceOrigin) {
        info!(srvc_id, url, ?origin, "instance registered");
        self.instances.insert(
            srvc_id.to_string(),
            Instance {
                srvc_id: srvc_id.to_string(),
                url: url.trim_end_matches('/').to_string(),
                origin,
            },
        );
    }

    /// Remove a deployed instance.  Static ones stay.
    pub fn undeploy(&self, srvc_id: &str) -> bool {
        self.instances
            .remove_if(srvc_id, |_, i| i.origin == InstanceOrigin::Deployed)
            .is_some()
    }

    /// Remove any instance.
    pub fn remove(&self, srvc_id: &str) -> bool {
        self.instances.remove(srvc_id).is_some()
    }

    /// Whether `id` has an instance of its own (not a product-wide one).
    pub fn has_instance(&self, id: &ModuleId) -> bool {
        self.instances.contains_key(id.as_str())
    }

    /// Base URL serving `id`.
    pub fn url_for(&self, id: &ModuleId) -> Option<String> {
        let product = id.product();
        [
            id.as_str().to_string(),
            product.to_string(),
            product.replace('-', "_"),
        ]
        .iter()
        .find_map(|key| self.instances.get(key).map(|i| i.url.clone()))
    }

    /// All instances sorted by id.
    pub fn list(&self) -> Vec<Instance> {
        let mut all: Vec<Instance> = self.instances.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.srvc_id.cmp(&b.srvc_id));
        all
    }
}
