//! Routing: compiled path matchers and per-tenant routing tables.

mod matcher;
mod table;

pub use matcher::{PathMatcher, Specificity};
pub use table::{CompiledModule, CompiledRoute, RouteMatches, RoutingTable};
