//! Module descriptors: what a module provides, requires and routes.
//!
//! All types serialize to the camelCase JSON used by the admin API.

mod descriptor;
mod routing;
mod validation;

pub use descriptor::{InterfaceDescriptor, InterfaceReference, InterfaceType, ModuleDescriptor};
pub use routing::{
    AUTH_LEVEL, HANDLER_LEVEL, POST_LEVEL, PRE_LEVEL, PatternSegment, Phase, ProxyType,
    RoutingEntry, parse_pattern,
};
