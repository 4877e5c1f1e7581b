//! Module instances: discovery, deployment and the HTTP transport.

mod client;
mod deployer;
mod discovery;

pub use client::HttpModuleClient;
pub use deployer::DiscoveryDeployer;
pub use discovery::{Discovery, Instance, InstanceOrigin};
