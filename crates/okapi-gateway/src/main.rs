//! Okapi gateway: entry point.
//!
//! Loads [`GatewayConfig`] and serves the admin API and the proxy.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OKAPI_CONFIG` | *(none)* | Configuration file (`.toml`, `.yaml`, `.json`). |
//! | `OKAPI_PORT` | `9130` | TCP port to listen on. |
//! | `OKAPI_OKAPI_URL` | `http://localhost:9130` | URL modules use to call back (`X-Okapi-Url`). |
//! | `OKAPI_REQUEST_TIMEOUT_MS` | `30000` | Timeout of each module call. |
//! | `OKAPI_DISCOVERY__<SRVC>` | *(none)* | Static instance URL for a module id or product. |
//! | `RUST_LOG` | `okapi_gateway=info` | Log filter. |

use anyhow::Context;
use okapi_gateway::server::GatewayServer;
use okapi_kernel::config::GatewayConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("okapi_gateway=info".parse()?),
        )
        .init();

    let config = GatewayConfig::load().context("loading gateway configuration")?;
    info!(
        port = config.port,
        okapi_url = %config.okapi_url,
        request_timeout_ms = config.request_timeout_ms,
        "Okapi gateway configuration loaded"
    );

    GatewayServer::new(config).start().await
}
