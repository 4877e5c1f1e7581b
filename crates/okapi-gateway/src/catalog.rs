//! Per-tenant index of provided interfaces.
//!
//! [`InterfaceCatalog`] maps an interface id to the modules that provide it,
//! in enablement order.  It is rebuilt with every tenant snapshot and used
//! for requirement satisfaction, collision detection and the interface
//! query endpoints.

use okapi_kernel::{InterfaceReference, InterfaceType, InterfaceVersion, ModuleDescriptor, ModuleId};
use serde::Serialize;
use std::collections::BTreeMap;

/// One module providing one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub module_id: ModuleId,
    pub version: String,
    pub interface_type: InterfaceType,
    /// `multiple` or system interface.
    #[serde(skip)]
    pub many_allowed: bool,
}

/// `interfaceId → providers`, derived from a set of module descriptors.
#[derive(Debug, Clone, Default)]
pub struct InterfaceCatalog {
    providers: BTreeMap<String, Vec<Provider>>,
}

impl InterfaceCatalog {
    /// Index the interfaces of `modules`, keeping their order.
    pub fn build<'a>(modules: impl IntoIterator<Item = &'a ModuleDescriptor>) -> Self {
        let mut providers: BTreeMap<String, Vec<Provider>> = BTreeMap::new();
        for module in modules {
            for interface in &module.provides {
                providers
                    .entry(interface.id.clone())
                    .or_default()
                    .push(Provider {
                        module_id: module.id.clone(),
                        version: interface.version.clone(),
                        interface_type: interface.interface_type,
                        many_allowed: interface.allows_many_providers(),
                    });
            }
        }
        Self { providers }
    }

    /// All providers of `interface_id`.
    pub fn providers(&self, interface_id: &str) -> &[Provider] {
        self.providers
            .get(interface_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Modules providing `interface_id` at a version compatible with
    /// `version` (a single version or a space-separated list).
    pub fn lookup(&self, interface_id: &str, version: &str) -> Vec<&ModuleId> {
        self.providers(interface_id)
            .iter()
            .filter(|p| InterfaceVersion::lists_compatible(&p.version, version).unwrap_or(false))
            .map(|p| &p.module_id)
            .collect()
    }

    /// Whether some provider satisfies `required`.
    pub fn satisfies(&self, required: &InterfaceReference) -> bool {
        !self.lookup(&required.id, &required.version).is_empty()
    }

    /// Interface ids with their providers, sorted by id.
    pub fn interfaces(&self) -> impl Iterator<Item = (&str, &[Provider])> {
        self.providers
            .iter()
            .map(|(id, providers)| (id.as_str(), providers.as_slice()))
    }

    /// Interfaces provided more than once where at least one provider does
    /// not allow that.  Returns `(interface, first, second)`.
    pub fn collisions(&self) -> Vec<(&str, &ModuleId, &ModuleId)> {
        let mut out = Vec::new();
        for (id, providers) in &self.providers {
            if providers.len() < 2 || providers.iter().all(|p| p.many_allowed) {
                continue;
            }
            out.push((id.as_str(), &providers[0].module_id, &providers[1].module_id));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use okapi_kernel::InterfaceDescriptor;

    fn module(id: &str, provides: &[(&str, &str, InterfaceType)]) -> ModuleDescriptor {
        provides.iter().fold(
            ModuleDescriptor::new(ModuleId::parse(id).unwrap()),
            |md, (iface, version, kind)| {
                md.with_provides(InterfaceDescriptor::new(*iface, *version).with_type(*kind))
            },
        )
    }

    #[test]
    fn lookup_honours_compatibility() {
        let modules = [
            module("basic-module-1.0.0", &[("bint", "1.0", InterfaceType::Regular)]),
            module("other-1.0.0", &[("users", "2.3", InterfaceType::Regular)]),
        ];
        let catalog = InterfaceCatalog::build(&modules);
        assert_eq!(catalog.lookup("bint", "1.0").len(), 1);
        assert!(catalog.lookup("bint", "2.0").is_empty());
        assert_eq!(
            catalog.lookup("users", "1.0 2.1")[0].as_str(),
            "other-1.0.0"
        );
        assert!(catalog.satisfies(&InterfaceReference::new("users", "2.3")));
        assert!(!catalog.satisfies(&InterfaceReference::new("missing", "1.0")));
    }

    #[test]
    fn collisions_ignore_multiple_and_system() {
        let modules = [
            module("a-1.0.0", &[
                ("bint", "1.0", InterfaceType::Regular),
                ("codex", "1.0", InterfaceType::Multiple),
                ("_tenant", "1.0", InterfaceType::System),
            ]),
            module("b-1.0.0", &[
                ("codex", "1.0", InterfaceType::Multiple),
                ("_tenant", "1.0", InterfaceType::System),
            ]),
        ];
        let catalog = InterfaceCatalog::build(&modules);
        assert!(catalog.collisions().is_empty());
        assert_eq!(catalog.providers("codex").len(), 2);

        let clash = [
            modules[0].clone(),
            module("c-1.0.0", &[("bint", "1.1", InterfaceType::Regular)]),
        ];
        let catalog = InterfaceCatalog::build(&clash);
        let collisions = catalog.collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, "bint");
        assert_eq!(collisions[0].1.as_str(), "a-1.0.0");
        assert_eq!(collisions[0].2.as_str(), "c-1.0.0");
    }

    #[test]
    fn interfaces_are_sorted() {
        let modules = [module("a-1.0.0", &[
            ("zeta", "1.0", InterfaceType::Regular),
            ("alpha", "1.0", InterfaceType::Regular),
        ])];
        let catalog = InterfaceCatalog::build(&modules);
        let ids: Vec<&str> = catalog.interfaces().map(|(id, _)| id).collect();
        assert_eq!(ids, ["alpha", "zeta"]);
    }
}
