//! Request handlers for the admin API and the proxy

pub mod discovery;
pub mod health;
pub mod interfaces;
pub mod modules;
pub mod proxy;
pub mod tenants;

pub use discovery::discovery_router;
pub use health::health_router;
pub use interfaces::interfaces_router;
pub use modules::modules_router;
pub use proxy::proxy;
pub use tenants::tenants_router;

use axum::body::Bytes;
use okapi_kernel::GatewayResult;
use serde::de::DeserializeOwned;

/// Parse a JSON request body; malformed input is a USER error.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> GatewayResult<T> {
    Ok(serde_json::from_slice(body)?)
}
