//! Dependency resolution for tenant install batches.
//!
//! [`DependencyResolver`] turns a tenant's enabled modules plus a batch of
//! enable/disable requests into an ordered install plan, or a classified
//! error.  It is pure: same inputs, same plan, no side effects.
//!
//! ```text
//! requests ──► resolve ids ──► apply to candidate set ──► closure ──► collisions ──► order
//!               (NOT_FOUND)                              (USER)        (USER)
//! ```
//!
//! Closure rules:
//! - a changed module with an unmet requirement pulls in a provider: the
//!   product already in the set if one provides the interface (upgraded to
//!   its latest compatible version), else the single catalog product that
//!   provides it, at its latest compatible version;
//! - an unchanged module with an unmet requirement is disabled too when
//!   `purge` is set, otherwise the batch fails.

mod order;

use crate::catalog::InterfaceCatalog;
use okapi_kernel::{
    Action, GatewayError, GatewayResult, InstallAction, InstallOptions, InterfaceReference,
    ModuleDescriptor, ModuleId, TenantModuleRequest,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Computes install plans against a fixed module catalog.
pub struct DependencyResolver<'a> {
    catalog: BTreeMap<&'a ModuleId, &'a ModuleDescriptor>,
    options: InstallOptions,
}

impl<'a> DependencyResolver<'a> {
    /// `modules` is every registered descriptor.
    pub fn new(modules: &'a [ModuleDescriptor], options: InstallOptions) -> Self {
        Self {
            catalog: modules.iter().map(|m| (&m.id, m)).collect(),
            options,
        }
    }

    /// Requests that move every enabled product to its latest version.
    pub fn upgrade_requests(enabled: &[ModuleId]) -> Vec<TenantModuleRequest> {
        enabled
            .iter()
            .map(|id| TenantModuleRequest::enable(id.without_version()))
            .collect()
    }

    /// Compute the plan for `requests` against the `enabled` modules.
    pub fn resolve(
        &self,
        enabled: &[ModuleId],
        requests: &[TenantModuleRequest],
    ) -> GatewayResult<Vec<InstallAction>> {
        let current = enabled
            .iter()
            .map(|id| self.lookup(id))
            .collect::<GatewayResult<Vec<_>>>()?;
        let mut batch = Batch::new(current);

        for request in requests {
            match request.action {
                Action::Enable | Action::Uptodate => {
                    let id = self.resolve_enable(&request.id, &batch)?;
                    let module = self.lookup(&id)?;
                    batch.pinned.insert(module.product().to_string());
                    batch.disabled_products.remove(module.product());
                    batch.enable(module, true);
                }
                Action::Disable => {
                    let id = resolve_disable(&request.id, &batch)?;
                    batch.pinned.insert(id.product().to_string());
                    batch.disabled_products.insert(id.product().to_string());
                    batch.disable(&id);
                }
            }
        }

        self.close(&mut batch)?;
        self.check_optional(&batch)?;
        check_collisions(&batch)?;
        self.plan(&batch)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn lookup(&self, id: &ModuleId) -> GatewayResult<&'a ModuleDescriptor> {
        self.catalog
            .get(id)
            .copied()
            .ok_or_else(|| GatewayError::not_found(format!("Module {id} not found")))
    }

    /// A full id must be registered; a product name becomes the latest
    /// acceptable version, never older than what is enabled.
    fn resolve_enable(&self, id: &ModuleId, batch: &Batch<'a>) -> GatewayResult<ModuleId> {
        if id.has_semver() {
            return self.lookup(id).map(|m| m.id.clone());
        }
        let candidates = self
            .catalog
            .keys()
            .copied()
            .filter(|m| self.options.accepts(m));
        let latest = id.get_latest(candidates);
        let enabled = batch.find_product(id.product()).map(|m| &m.id);
        match (latest.has_semver(), enabled) {
            (true, Some(current)) if current > &latest => Ok(current.clone()),
            (true, _) => Ok(latest),
            (false, Some(current)) => Ok(current.clone()),
            (false, None) => Err(GatewayError::not_found(format!(
                "No module found for product {}",
                id.product()
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Closure
    // ─────────────────────────────────────────────────────────────────────────

    fn close(&self, batch: &mut Batch<'a>) -> GatewayResult<()> {
        'restart: loop {
            for idx in 0..batch.target.len() {
                let module = batch.target[idx];
                for required in &module.requires {
                    if batch.provides(required) {
                        continue;
                    }
                    if batch.is_changed(&module.id) {
                        self.pull(batch, module, required)?;
                    } else if self.options.purge {
                        debug!(module = %module.id, interface = %required.id, "purging dependent");
                        batch.disable(&module.id);
                    } else {
                        return Err(batch.required_by(module, required));
                    }
                    continue 'restart;
                }
            }
            return Ok(());
        }
    }

    /// Add or upgrade a provider of `required` for `dependent`.
    fn pull(
        &self,
        batch: &mut Batch<'a>,
        dependent: &ModuleDescriptor,
        required: &InterfaceReference,
    ) -> GatewayResult<()> {
        let incompatible = |have: &ModuleId| {
            GatewayError::user(format!(
                "Incompatible version for module {have} interface {}. Need {} (required by {})",
                required.id, required.version, dependent.id
            ))
        };

        // A product already in the set provides the interface: upgrade it.
        if let Some(existing) = batch
            .target
            .iter()
            .find(|m| m.provided(&required.id).is_some())
            .copied()
        {
            let product = existing.product();
            if batch.pinned.contains(product) || batch.auto.contains(product) {
                return Err(incompatible(&existing.id));
            }
            let upgrade = self
                .catalog
                .values()
                .filter(|m| m.product() == product && self.options.accepts(&m.id) && m.satisfies(required))
                .last()
                .copied()
                .ok_or_else(|| incompatible(&existing.id))?;
            debug!(from = %existing.id, to = %upgrade.id, "upgrading provider");
            batch.auto.insert(product.to_string());
            batch.enable(upgrade, false);
            return Ok(());
        }

        // Otherwise search the catalog, one product only.
        let mut by_product: BTreeMap<&str, &'a ModuleDescriptor> = BTreeMap::new();
        for module in self.catalog.values().copied() {
            if self.options.accepts(&module.id)
                && module.satisfies(required)
                && !batch.disabled_products.contains(module.product())
            {
                // Ascending iteration: the last one seen is the latest.
                by_product.insert(module.product(), module);
            }
        }
        match by_product.len() {
            0 if batch.disabled_products.iter().any(|p| {
                self.catalog
                    .values()
                    .any(|m| m.product() == p && m.satisfies(required))
            }) =>
            {
                Err(batch.required_by(dependent, required))
            }
            0 => Err(GatewayError::user(format!(
                "Interface {} {} required by module {} not found",
                required.id, required.version, dependent.id
            ))),
            1 => {
                let (product, provider) = by_product.into_iter().next().ok_or_else(|| {
                    GatewayError::internal("provider vanished during resolution")
                })?;
                debug!(module = %provider.id, interface = %required.id, "pulling in provider");
                batch.auto.insert(product.to_string());
                batch.enable(provider, false);
                Ok(())
            }
            _ => Err(GatewayError::user(format!(
                "Interface {} {} required by module {} is provided by multiple products: {}",
                required.id,
                required.version,
                dependent.id,
                by_product.keys().copied().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Optional interfaces must be compatible when some module provides them.
    fn check_optional(&self, batch: &Batch<'a>) -> GatewayResult<()> {
        for module in &batch.target {
            for optional in &module.optional {
                let present: Vec<_> = batch
                    .target
                    .iter()
                    .filter(|m| m.provided(&optional.id).is_some())
                    .collect();
                if !present.is_empty() && !present.iter().any(|m| m.satisfies(optional)) {
                    return Err(GatewayError::user(format!(
                        "Incompatible version for module {} interface {}. Need {} (optional for {})",
                        present[0].id, optional.id, optional.version, module.id
                    )));
                }
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plan
    // ─────────────────────────────────────────────────────────────────────────

    fn plan(&self, batch: &Batch<'a>) -> GatewayResult<Vec<InstallAction>> {
        let enables = batch
            .steps
            .iter()
            .map(|s| self.lookup(&s.id))
            .collect::<GatewayResult<Vec<_>>>()?;
        let disables = batch
            .disables
            .iter()
            .map(|id| self.lookup(id))
            .collect::<GatewayResult<Vec<_>>>()?;

        let mut plan = Vec::with_capacity(enables.len() + disables.len());
        for idx in order::providers_first(&enables) {
            let step = &batch.steps[idx];
            plan.push(InstallAction {
                id: step.id.clone(),
                from: step.from.clone(),
                action: step.action,
            });
        }
        for idx in order::dependents_first(&disables) {
            plan.push(InstallAction::new(batch.disables[idx].clone(), Action::Disable));
        }
        debug!(steps = plan.len(), "install plan computed");
        Ok(plan)
    }
}

fn resolve_disable(id: &ModuleId, batch: &Batch<'_>) -> GatewayResult<ModuleId> {
    let found = if id.has_semver() {
        batch.target.iter().find(|m| &m.id == id).copied()
    } else {
        batch.find_product(id.product())
    };
    found
        .map(|m| m.id.clone())
        .ok_or_else(|| GatewayError::not_found(format!("Module {id} is not enabled")))
}

fn check_collisions(batch: &Batch<'_>) -> GatewayResult<()> {
    let catalog = InterfaceCatalog::build(batch.target.iter().copied());
    match catalog.collisions().first() {
        Some((interface, first, second)) => Err(GatewayError::user(format!(
            "Interface {interface} of module {second} is already provided by module {first}"
        ))),
        None => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Working state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Step {
    id: ModuleId,
    from: Option<ModuleId>,
    action: Action,
}

/// Candidate set plus the changes that produced it.
struct Batch<'a> {
    current: Vec<&'a ModuleDescriptor>,
    target: Vec<&'a ModuleDescriptor>,
    /// Enable and uptodate steps in order of first appearance.
    steps: Vec<Step>,
    disables: Vec<ModuleId>,
    /// Products named by the caller.
    pinned: BTreeSet<String>,
    /// Products explicitly disabled by the caller.
    disabled_products: BTreeSet<String>,
    /// Products added or upgraded by closure.
    auto: BTreeSet<String>,
}

impl<'a> Batch<'a> {
    fn new(current: Vec<&'a ModuleDescriptor>) -> Self {
        Self {
            target: current.clone(),
            current,
            steps: Vec::new(),
            disables: Vec::new(),
            pinned: BTreeSet::new(),
            disabled_products: BTreeSet::new(),
            auto: BTreeSet::new(),
        }
    }

    fn find_product(&self, product: &str) -> Option<&'a ModuleDescriptor> {
        self.target.iter().find(|m| m.product() == product).copied()
    }

    fn was_enabled(&self, id: &ModuleId) -> bool {
        self.current.iter().any(|m| &m.id == id)
    }

    fn provides(&self, required: &InterfaceReference) -> bool {
        self.target.iter().any(|m| m.satisfies(required))
    }

    fn is_changed(&self, id: &ModuleId) -> bool {
        self.steps
            .iter()
            .any(|s| &s.id == id && s.action == Action::Enable)
    }

    fn enable(&mut self, module: &'a ModuleDescriptor, requested: bool) {
        let product = module.product();
        match self.target.iter().position(|m| m.product() == product) {
            Some(pos) => {
                let existing = self.target[pos].id.clone();
                if existing == module.id {
                    let seen = self.steps.iter().any(|s| s.id.product() == product);
                    if requested && !seen && self.was_enabled(&module.id) {
                        self.steps.push(Step {
                            id: module.id.clone(),
                            from: None,
                            action: Action::Uptodate,
                        });
                    }
                    return;
                }
                self.target[pos] = module;
                match self.steps.iter_mut().find(|s| s.id.product() == product) {
                    Some(step) => {
                        if step.action == Action::Uptodate {
                            step.from = Some(step.id.clone());
                        }
                        step.id = module.id.clone();
                        step.action = Action::Enable;
                        if step.from.as_ref() == Some(&module.id) {
                            // Back to what was enabled before the batch.
                            step.from = None;
                            step.action = Action::Uptodate;
                        }
                    }
                    None => self.steps.push(Step {
                        id: module.id.clone(),
                        from: Some(existing),
                        action: Action::Enable,
                    }),
                }
            }
            None => {
                self.target.push(module);
                let from = self
                    .disables
                    .iter()
                    .position(|d| d.product() == product)
                    .map(|i| self.disables.remove(i));
                let action = if from.as_ref() == Some(&module.id) {
                    Action::Uptodate
                } else {
                    Action::Enable
                };
                self.steps.push(Step {
                    id: module.id.clone(),
                    from: from.filter(|f| f != &module.id),
                    action,
                });
            }
        }
    }

    fn disable(&mut self, id: &ModuleId) {
        self.target.retain(|m| &m.id != id);
        match self.steps.iter().position(|s| &s.id == id) {
            Some(i) => {
                let step = self.steps.remove(i);
                match (step.from, step.action) {
                    (Some(from), _) => self.disables.push(from),
                    (None, Action::Uptodate) => self.disables.push(step.id),
                    (None, _) => {}
                }
            }
            None if self.was_enabled(id) && !self.disables.contains(id) => {
                self.disables.push(id.clone());
            }
            None => {}
        }
    }

    /// Error for an unchanged `dependent` losing its provider.
    fn required_by(&self, dependent: &ModuleDescriptor, required: &InterfaceReference) -> GatewayError {
        let removed = self
            .current
            .iter()
            .find(|m| m.satisfies(required) && !self.target.iter().any(|t| t.id == m.id));
        match removed {
            Some(provider) => GatewayError::user(format!(
                "Module {} is required by module {} (interface {} {})",
                provider.id, dependent.id, required.id, required.version
            )),
            None => GatewayError::user(format!(
                "Interface {} {} required by module {} is not provided",
                required.id, required.version, dependent.id
            )),
        }
    }
}
