//! Registries and the install commit.

mod modules;
mod tenants;

pub use modules::ModuleManager;
pub use tenants::{TenantManager, TenantSnapshot};
