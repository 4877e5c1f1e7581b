//! MATCH and REDIRECT: from a routing table and a request line to the
//! ordered list of steps to execute.

use crate::router::{CompiledRoute, RoutingTable};
use okapi_kernel::{GatewayError, GatewayResult, ModuleId, ProxyType};
use std::sync::Arc;
use tracing::debug;

/// A handler to call and the path it is called with (differs from the
/// request path after a redirect).
#[derive(Debug, Clone)]
pub struct HandlerStep {
    pub route: Arc<CompiledRoute>,
    pub path: String,
}

/// Steps of one request, per phase, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub pre: Vec<Arc<CompiledRoute>>,
    pub auth: Vec<Arc<CompiledRoute>>,
    pub handlers: Vec<HandlerStep>,
    pub post: Vec<Arc<CompiledRoute>>,
}

impl ExecutionPlan {
    /// Match `method path` against `table`.  Filters match the original
    /// path; redirects are expanded into the handlers they lead to.
    pub fn build(
        table: &RoutingTable,
        method: &str,
        path: &str,
        selector: Option<&ModuleId>,
    ) -> GatewayResult<Self> {
        let matches = table.lookup(method, path);
        let selected = select_handlers(&matches.handlers, path, selector)?;
        if selected.is_empty() {
            return Err(GatewayError::not_found(format!(
                "No suitable module found for path {path}"
            )));
        }
        let handlers = expand_redirects(table, method, path, selected, selector)?;
        debug!(
            path,
            pre = matches.pre.len(),
            auth = matches.auth.len(),
            handlers = handlers.len(),
            post = matches.post.len(),
            "request matched"
        );
        Ok(Self {
            pre: matches.pre,
            auth: matches.auth,
            handlers,
            post: matches.post,
        })
    }
}

/// One handler per level: the most specific match.  Equally specific
/// matches from different modules of a many-provider interface need the
/// selector; routes of such interfaces that the selector rules out are
/// dropped first.
fn select_handlers(
    routes: &[Arc<CompiledRoute>],
    path: &str,
    selector: Option<&ModuleId>,
) -> GatewayResult<Vec<Arc<CompiledRoute>>> {
    let candidates: Vec<&Arc<CompiledRoute>> = routes
        .iter()
        .filter(|r| !r.many_providers || selector.is_none_or(|s| r.module_id.has_prefix(s)))
        .collect();

    let mut selected = Vec::new();
    for level in candidates.chunk_by(|a, b| a.level() == b.level()) {
        let Some(best) = level.iter().map(|r| r.specificity()).max() else {
            continue;
        };
        let top: Vec<&Arc<CompiledRoute>> = level
            .iter()
            .copied()
            .filter(|r| r.specificity() == best)
            .collect();
        let first = top[0];
        let ambiguous = top.iter().any(|r| r.module_id != first.module_id);
        if ambiguous && selector.is_none() && top.iter().any(|r| r.many_providers) {
            let modules: Vec<String> = top.iter().map(|r| r.module_id.to_string()).collect();
            let interface = top
                .iter()
                .find_map(|r| r.interface_id.as_deref())
                .unwrap_or_default();
            return Err(GatewayError::not_found(format!(
                "Multiple modules ({}) provide interface {interface} for path {path}; \
                 use X-Okapi-Module-Id to select one",
                modules.join(", ")
            )));
        }
        selected.push(Arc::clone(first));
    }
    Ok(selected)
}

struct Pending {
    route: Arc<CompiledRoute>,
    path: String,
    chain: Vec<String>,
}

/// Replace every redirect with the handlers selected at its target,
/// depth first.  A target already on the current chain is a loop.
fn expand_redirects(
    table: &RoutingTable,
    method: &str,
    origin: &str,
    selected: Vec<Arc<CompiledRoute>>,
    selector: Option<&ModuleId>,
) -> GatewayResult<Vec<HandlerStep>> {
    let mut stack: Vec<Pending> = selected
        .into_iter()
        .rev()
        .map(|route| Pending {
            route,
            path: origin.to_string(),
            chain: vec![origin.to_string()],
        })
        .collect();

    let mut steps = Vec::new();
    while let Some(Pending { route, path, mut chain }) = stack.pop() {
        if route.entry.proxy_type != ProxyType::Redirect {
            steps.push(HandlerStep { route, path });
            continue;
        }
        let target = route.entry.redirect_path.clone().unwrap_or_default();
        let looped = chain.contains(&target);
        chain.push(target.clone());
        if looped {
            return Err(GatewayError::internal(format!(
                "Redirect loop: {}",
                chain.join(" -> ")
            )));
        }

        let next = select_handlers(&table.lookup(method, &target).handlers, &target, selector)?;
        if next.is_empty() {
            return Err(GatewayError::internal(format!(
                "Redirecting {path} to {target} FAILED. No suitable module found"
            )));
        }
        debug!(from = %path, to = %target, module = %route.module_id, "redirect");
        for next_route in next.into_iter().rev() {
            stack.push(Pending {
                route: next_route,
                path: target.clone(),
                chain: chain.clone(),
            });
        }
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::CompiledModule;
    use okapi_kernel::{ErrorType, InterfaceDescriptor, InterfaceType, ModuleDescriptor, Phase, RoutingEntry};

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    fn provider(name: &str, iface: &str, kind: InterfaceType, entries: Vec<RoutingEntry>) -> CompiledModule {
        let interface = entries.into_iter().fold(
            InterfaceDescriptor::new(iface, "1.0").with_type(kind),
            InterfaceDescriptor::with_handler,
        );
        CompiledModule::compile(ModuleDescriptor::new(id(name)).with_provides(interface)).unwrap()
    }

    fn handler(pattern: &str) -> RoutingEntry {
        RoutingEntry::handler(&["GET"], pattern)
    }

    fn handler_modules(plan: &ExecutionPlan) -> Vec<String> {
        plan.handlers
            .iter()
            .map(|s| format!("{}@{}", s.route.module_id, s.path))
            .collect()
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn unmatched_path_is_not_found() {
        let m = provider("users-1.0.0", "users", InterfaceType::Regular, vec![handler("/users")]);
        let table = RoutingTable::build([&m]);
        let err = ExecutionPlan::build(&table, "GET", "/nothing", None).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        assert!(err.message().contains("/nothing"));
    }

    #[test]
    fn most_specific_handler_wins_per_level() {
        let m = provider(
            "users-1.0.0",
            "users",
            InterfaceType::Regular,
            vec![handler("/users/*"), handler("/users/{id}"), handler("/users/self")],
        );
        let table = RoutingTable::build([&m]);
        let plan = ExecutionPlan::build(&table, "GET", "/users/self", None).unwrap();
        assert_eq!(plan.handlers.len(), 1);
        assert_eq!(plan.handlers[0].route.matcher.pattern(), "/users/self");

        let plan = ExecutionPlan::build(&table, "GET", "/users/42", None).unwrap();
        assert_eq!(plan.handlers[0].route.matcher.pattern(), "/users/{id}");
    }

    #[test]
    fn filters_are_collected_per_phase() {
        let filters = CompiledModule::compile(
            ModuleDescriptor::new(id("auth-1.0.0"))
                .with_filter(RoutingEntry::filter(Phase::Auth, "/*"))
                .with_filter(RoutingEntry::filter(Phase::Post, "/*")),
        )
        .unwrap();
        let m = provider("users-1.0.0", "users", InterfaceType::Regular, vec![handler("/users")]);
        let table = RoutingTable::build([&filters, &m]);
        let plan = ExecutionPlan::build(&table, "GET", "/users", None).unwrap();
        assert!(plan.pre.is_empty());
        assert_eq!(plan.auth.len(), 1);
        assert_eq!(plan.post.len(), 1);
    }

    #[test]
    fn multiple_interface_needs_selector() {
        let a = provider("codex-a-1.0.0", "codex", InterfaceType::Multiple, vec![handler("/codex")]);
        let b = provider("codex-b-1.0.0", "codex", InterfaceType::Multiple, vec![handler("/codex")]);
        let table = RoutingTable::build([&a, &b]);

        let err = ExecutionPlan::build(&table, "GET", "/codex", None).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        assert!(err.message().contains("codex-a-1.0.0"));

        let plan = ExecutionPlan::build(&table, "GET", "/codex", Some(&id("codex-b"))).unwrap();
        assert_eq!(handler_modules(&plan), ["codex-b-1.0.0@/codex"]);

        let plan = ExecutionPlan::build(&table, "GET", "/codex", Some(&id("codex-a-1.0.0"))).unwrap();
        assert_eq!(handler_modules(&plan), ["codex-a-1.0.0@/codex"]);
    }

    #[test]
    fn selector_matching_nothing_is_not_found() {
        let a = provider("codex-a-1.0.0", "codex", InterfaceType::Multiple, vec![handler("/codex")]);
        let table = RoutingTable::build([&a]);
        let err = ExecutionPlan::build(&table, "GET", "/codex", Some(&id("codex-z"))).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[test]
    fn redirect_is_expanded() {
        let r = provider(
            "redirect-1.0.0",
            "old",
            InterfaceType::Regular,
            vec![handler("/old").with_redirect("/new")],
        );
        let n = provider("new-1.0.0", "new", InterfaceType::Regular, vec![handler("/new")]);
        let table = RoutingTable::build([&r, &n]);
        let plan = ExecutionPlan::build(&table, "GET", "/old", None).unwrap();
        assert_eq!(handler_modules(&plan), ["new-1.0.0@/new"]);
    }

    #[test]
    fn redirect_loop_is_detected() {
        let a = provider(
            "loop-a-1.0.0",
            "a",
            InterfaceType::Regular,
            vec![handler("/a").with_redirect("/b")],
        );
        let b = provider(
            "loop-b-1.0.0",
            "b",
            InterfaceType::Regular,
            vec![handler("/b").with_redirect("/a")],
        );
        let table = RoutingTable::build([&a, &b]);
        let err = ExecutionPlan::build(&table, "GET", "/a", None).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Internal);
        assert_eq!(err.message(), "Redirect loop: /a -> /b -> /a");
    }

    #[test]
    fn self_redirect_is_a_loop() {
        let a = provider(
            "self-1.0.0",
            "s",
            InterfaceType::Regular,
            vec![handler("/s").with_redirect("/s")],
        );
        let table = RoutingTable::build([&a]);
        let err = ExecutionPlan::build(&table, "GET", "/s", None).unwrap_err();
        assert!(err.message().contains("loop:"));
    }

    #[test]
    fn redirect_to_nowhere_fails() {
        let a = provider(
            "dangling-1.0.0",
            "d",
            InterfaceType::Regular,
            vec![handler("/d").with_redirect("/gone")],
        );
        let table = RoutingTable::build([&a]);
        let err = ExecutionPlan::build(&table, "GET", "/d", None).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Internal);
        assert_eq!(
            err.message(),
            "Redirecting /d to /gone FAILED. No suitable module found"
        );
    }
}
