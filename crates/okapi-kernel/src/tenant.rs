//! Tenants, their enabled modules, and install batches.

use crate::version::ModuleId;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Tenant
// ─────────────────────────────────────────────────────────────────────────────

/// A registered tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl TenantDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
        }
    }

    /// Tenant ids go into headers and URLs: letters, digits and `_` only,
    /// starting with a letter.
    pub fn validate(&self) -> Result<(), String> {
        let mut chars = self.id.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return Err(format!("Invalid tenant id '{}'", self.id)),
        }
        if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(())
        } else {
            Err(format!("Invalid tenant id '{}'", self.id))
        }
    }
}

/// Ordered set of modules enabled for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantEnablement {
    pub tenant_id: String,
    pub modules: Vec<ModuleId>,
}

impl TenantEnablement {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            modules: Vec::new(),
        }
    }

    pub fn is_enabled(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }

    /// The enabled module of `product`, if any.
    pub fn enabled_product(&self, product: &str) -> Option<&ModuleId> {
        self.modules.iter().find(|m| m.product() == product)
    }

    /// Apply a committed plan: disables are removed, enables replace their
    /// `from` module in place or are appended.
    pub fn apply(&mut self, plan: &[InstallAction]) {
        for step in plan {
            match step.action {
                Action::Disable => self.modules.retain(|m| m != &step.id),
                Action::Enable => {
                    let slot = step
                        .from
                        .as_ref()
                        .and_then(|from| self.modules.iter().position(|m| m == from));
                    match slot {
                        Some(pos) => self.modules[pos] = step.id.clone(),
                        None if !self.is_enabled(&step.id) => self.modules.push(step.id.clone()),
                        None => {}
                    }
                }
                Action::Uptodate => {}
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Install batches
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Enable,
    Disable,
    Uptodate,
}

/// One requested change: a full module id or a bare product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantModuleRequest {
    pub id: ModuleId,
    #[serde(default)]
    pub action: Action,
}

impl TenantModuleRequest {
    pub fn enable(id: ModuleId) -> Self {
        Self {
            id,
            action: Action::Enable,
        }
    }

    pub fn disable(id: ModuleId) -> Self {
        Self {
            id,
            action: Action::Disable,
        }
    }
}

/// One step of a computed install plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallAction {
    pub id: ModuleId,
    /// The module this one replaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ModuleId>,
    pub action: Action,
}

impl InstallAction {
    pub fn new(id: ModuleId, action: Action) -> Self {
        Self {
            id,
            from: None,
            action,
        }
    }

    pub fn with_from(mut self, from: ModuleId) -> Self {
        self.from = Some(from);
        self
    }
}

/// Flags accepted by the install and upgrade operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallOptions {
    /// Compute the plan only.
    pub simulate: bool,
    /// Call the deployer for enabled and disabled modules.
    pub deploy: bool,
    /// Cascade disables to dependents.
    pub purge: bool,
    /// Allow pre-release versions when resolving product names.
    pub pre_release: bool,
    /// Allow npm snapshot builds when resolving product names.
    pub npm_snapshot: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            simulate: false,
            deploy: false,
            purge: false,
            pre_release: true,
            npm_snapshot: true,
        }
    }
}

impl InstallOptions {
    pub fn simulate() -> Self {
        Self {
            simulate: true,
            ..Self::default()
        }
    }

    pub fn with_deploy(mut self, deploy: bool) -> Self {
        self.deploy = deploy;
        self
    }

    pub fn with_purge(mut self, purge: bool) -> Self {
        self.purge = purge;
        self
    }

    pub fn with_pre_release(mut self, pre_release: bool) -> Self {
        self.pre_release = pre_release;
        self
    }

    pub fn with_npm_snapshot(mut self, npm_snapshot: bool) -> Self {
        self.npm_snapshot = npm_snapshot;
        self
    }

    /// Whether product-name resolution may pick `id`.
    pub fn accepts(&self, id: &ModuleId) -> bool {
        (self.pre_release || !id.has_pre_release()) && (self.npm_snapshot || !id.has_npm_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    #[test]
    fn install_action_json_shape() {
        let step = InstallAction::new(id("mod-a-2.0.0"), Action::Enable).with_from(id("mod-a-1.0.0"));
        assert_eq!(
            serde_json::to_string(&step).unwrap(),
            r#"{"id":"mod-a-2.0.0","from":"mod-a-1.0.0","action":"enable"}"#
        );
        let plain = InstallAction::new(id("mod-b-1.0.0"), Action::Uptodate);
        assert_eq!(
            serde_json::to_string(&plain).unwrap(),
            r#"{"id":"mod-b-1.0.0","action":"uptodate"}"#
        );
    }

    #[test]
    fn request_action_defaults_to_enable() {
        let reqs: Vec<TenantModuleRequest> =
            serde_json::from_str(r#"[{"id":"mod-a"},{"id":"mod-b-1.0.0","action":"disable"}]"#).unwrap();
        assert_eq!(reqs[0].action, Action::Enable);
        assert!(!reqs[0].id.has_semver());
        assert_eq!(reqs[1].action, Action::Disable);
    }

    #[test]
    fn apply_replaces_in_place() {
        let mut en = TenantEnablement::new("diku");
        en.modules = vec![id("a-1.0.0"), id("b-1.0.0"), id("c-1.0.0")];
        en.apply(&[
            InstallAction::new(id("b-2.0.0"), Action::Enable).with_from(id("b-1.0.0")),
            InstallAction::new(id("d-1.0.0"), Action::Enable),
            InstallAction::new(id("a-1.0.0"), Action::Disable),
            InstallAction::new(id("c-1.0.0"), Action::Uptodate),
        ]);
        let ids: Vec<&str> = en.modules.iter().map(ModuleId::as_str).collect();
        assert_eq!(ids, ["b-2.0.0", "c-1.0.0", "d-1.0.0"]);
        assert_eq!(en.enabled_product("b").map(ModuleId::as_str), Some("b-2.0.0"));
    }

    #[test]
    fn options_filter_candidates() {
        let strict = InstallOptions::default()
            .with_pre_release(false)
            .with_npm_snapshot(false);
        assert!(strict.accepts(&id("m-1.0.0")));
        assert!(!strict.accepts(&id("m-1.0.0-SNAPSHOT")));
        assert!(!strict.accepts(&id("m-1.0.10000123")));
        assert!(InstallOptions::default().accepts(&id("m-1.0.0-SNAPSHOT")));
    }

    #[test]
    fn tenant_id_rules() {
        assert!(TenantDescriptor::new("diku").validate().is_ok());
        assert!(TenantDescriptor::new("test_tenant2").validate().is_ok());
        assert!(TenantDescriptor::new("1abc").validate().is_err());
        assert!(TenantDescriptor::new("a-b").validate().is_err());
        assert!(TenantDescriptor::new("").validate().is_err());
    }
}
