use super::routing::RoutingEntry;
use crate::version::{InterfaceVersion, ModuleId};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Interfaces
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a provided interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    /// At most one provider per tenant.
    #[default]
    Regular,
    /// Gateway-internal interface (tenant init, timers, ...).
    System,
    /// Several providers may coexist; callers pick one per request.
    Multiple,
    Proxy,
}

/// An interface a module provides, with the routes that implement it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDescriptor {
    pub id: String,
    /// One version or a space-separated list.
    pub version: String,
    #[serde(default)]
    pub interface_type: InterfaceType,
    #[serde(default)]
    pub handlers: Vec<RoutingEntry>,
}

impl InterfaceDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            interface_type: InterfaceType::Regular,
            handlers: Vec::new(),
        }
    }

    pub fn with_type(mut self, interface_type: InterfaceType) -> Self {
        self.interface_type = interface_type;
        self
    }

    pub fn with_handler(mut self, entry: RoutingEntry) -> Self {
        self.handlers.push(entry);
        self
    }

    /// System interfaces are declared as such or have an id starting with
    /// `_` (`_tenant`, `_timer`, ...).
    pub fn is_system(&self) -> bool {
        self.interface_type == InterfaceType::System || self.id.starts_with('_')
    }

    /// Whether several enabled modules may provide this interface at once.
    pub fn allows_many_providers(&self) -> bool {
        self.interface_type == InterfaceType::Multiple || self.is_system()
    }

    /// Whether this provided interface satisfies `required`.
    pub fn satisfies(&self, required: &InterfaceReference) -> bool {
        self.id == required.id
            && InterfaceVersion::lists_compatible(&self.version, &required.version)
                .unwrap_or(false)
    }
}

/// A required or optional interface: id plus acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceReference {
    pub id: String,
    /// One version or a space-separated list; any listed version is
    /// acceptable.
    pub version: String,
}

impl InterfaceReference {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for InterfaceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Registered module: identity, provided and required interfaces, routes.
///
/// Immutable once registered; everything else refers to it by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provides: Vec<InterfaceDescriptor>,
    #[serde(default)]
    pub requires: Vec<InterfaceReference>,
    /// Interfaces used when present; never pulled in automatically.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional: Vec<InterfaceReference>,
    /// Routes not tied to any interface.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RoutingEntry>,
    /// Opaque to the gateway; handed to the deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_descriptor: Option<serde_json::Value>,
}

impl ModuleDescriptor {
    pub fn new(id: ModuleId) -> Self {
        Self {
            name: id.product().to_string(),
            id,
            provides: Vec::new(),
            requires: Vec::new(),
            optional: Vec::new(),
            filters: Vec::new(),
            launch_descriptor: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_provides(mut self, interface: InterfaceDescriptor) -> Self {
        self.provides.push(interface);
        self
    }

    pub fn with_requires(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.requires.push(InterfaceReference::new(id, version));
        self
    }

    pub fn with_optional(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.optional.push(InterfaceReference::new(id, version));
        self
    }

    pub fn with_filter(mut self, entry: RoutingEntry) -> Self {
        self.filters.push(entry);
        self
    }

    pub fn with_launch_descriptor(mut self, launch: serde_json::Value) -> Self {
        self.launch_descriptor = Some(launch);
        self
    }

    pub fn product(&self) -> &str {
        self.id.product()
    }

    /// The provided interface with `id`, if any.
    pub fn provided(&self, id: &str) -> Option<&InterfaceDescriptor> {
        self.provides.iter().find(|i| i.id == id)
    }

    /// Whether this module provides something compatible with `required`.
    pub fn satisfies(&self, required: &InterfaceReference) -> bool {
        self.provides.iter().any(|i| i.satisfies(required))
    }

    /// Every routing entry in declaration order: interface handlers first,
    /// then module-level filters.  Filters have no owning interface.
    pub fn routing_entries(&self) -> impl Iterator<Item = (Option<&InterfaceDescriptor>, &RoutingEntry)> {
        self.provides
            .iter()
            .flat_map(|i| i.handlers.iter().map(move |h| (Some(i), h)))
            .chain(self.filters.iter().map(|f| (None, f)))
    }
}
