//! Per-tenant routing table.
//!
//! Modules are compiled once at registration ([`CompiledModule`]); a tenant
//! table is the merge of its enabled modules, in enablement order then
//! declaration order, split by phase and stably sorted by level.  Tables are
//! immutable: enablement changes build a new one.

use super::matcher::{PathMatcher, Specificity};
use okapi_kernel::{GatewayError, GatewayResult, ModuleDescriptor, ModuleId, Phase, RoutingEntry};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Compiled routes
// ─────────────────────────────────────────────────────────────────────────────

/// A routing entry with its compiled matcher and owner.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub module_id: ModuleId,
    /// `None` for module-level filters.
    pub interface_id: Option<String>,
    /// The owning interface admits several providers.
    pub many_providers: bool,
    pub entry: RoutingEntry,
    pub matcher: PathMatcher,
}

impl CompiledRoute {
    pub fn level(&self) -> i32 {
        self.entry.effective_level()
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.entry.matches_method(method) && self.matcher.matches(path)
    }

    pub fn specificity(&self) -> Specificity {
        self.matcher.specificity()
    }

    /// `"{phase} {pattern}"` as sent in `X-Okapi-Filter`.
    pub fn filter_label(&self) -> String {
        let phase = self.entry.phase.map(Phase::as_str).unwrap_or("handler");
        format!("{phase} {}", self.matcher.pattern())
    }
}

/// A registered module with its routes compiled.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub descriptor: Arc<ModuleDescriptor>,
    pub routes: Vec<Arc<CompiledRoute>>,
}

impl CompiledModule {
    pub fn compile(descriptor: ModuleDescriptor) -> GatewayResult<Self> {
        let mut routes = Vec::new();
        for (interface, entry) in descriptor.routing_entries() {
            let matcher = PathMatcher::compile(entry)
                .map_err(|e| GatewayError::user(format!("Module '{}': {e}", descriptor.id)))?;
            routes.push(Arc::new(CompiledRoute {
                module_id: descriptor.id.clone(),
                interface_id: interface.map(|i| i.id.clone()),
                many_providers: interface.is_some_and(|i| i.allows_many_providers()),
                entry: entry.clone(),
                matcher,
            }));
        }
        Ok(Self {
            descriptor: Arc::new(descriptor),
            routes,
        })
    }

    pub fn id(&self) -> &ModuleId {
        &self.descriptor.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RoutingTable
// ─────────────────────────────────────────────────────────────────────────────

/// Routes of one tenant grouped by phase.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    pre: Vec<Arc<CompiledRoute>>,
    auth: Vec<Arc<CompiledRoute>>,
    handlers: Vec<Arc<CompiledRoute>>,
    post: Vec<Arc<CompiledRoute>>,
}

/// Routes matching one request, per phase, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RouteMatches {
    pub pre: Vec<Arc<CompiledRoute>>,
    pub auth: Vec<Arc<CompiledRoute>>,
    pub handlers: Vec<Arc<CompiledRoute>>,
    pub post: Vec<Arc<CompiledRoute>>,
}

impl RoutingTable {
    /// Merge the routes of `modules` (in enablement order).
    pub fn build<'a>(modules: impl IntoIterator<Item = &'a CompiledModule>) -> Self {
        let mut table = Self::default();
        for module in modules {
            for route in &module.routes {
                let bucket = match route.entry.phase {
                    Some(Phase::Pre) => &mut table.pre,
                    Some(Phase::Auth) => &mut table.auth,
                    Some(Phase::Post) => &mut table.post,
                    None => &mut table.handlers,
                };
                bucket.push(Arc::clone(route));
            }
        }
        // Stable sorts keep registration order within a level.
        for bucket in [
            &mut table.pre,
            &mut table.auth,
            &mut table.handlers,
            &mut table.post,
        ] {
            bucket.sort_by_key(|r| r.level());
        }
        table
    }

    /// Every route matching `method` and `path`, per phase.
    pub fn lookup(&self, method: &str, path: &str) -> RouteMatches {
        let select = |routes: &[Arc<CompiledRoute>]| {
            routes
                .iter()
                .filter(|r| r.matches(method, path))
                .cloned()
                .collect::<Vec<_>>()
        };
        RouteMatches {
            pre: select(&self.pre),
            auth: select(&self.auth),
            handlers: select(&self.handlers),
            post: select(&self.post),
        }
    }

    pub fn len(&self) -> usize {
        self.pre.len() + self.auth.len() + self.handlers.len() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
