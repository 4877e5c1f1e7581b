//! Persistence implementations.

mod memory;

pub use memory::{InMemoryModuleStore, InMemoryTenantStore};
