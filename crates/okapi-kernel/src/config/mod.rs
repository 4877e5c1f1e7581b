//! Gateway configuration.
//!
//! Layering, later sources win:
//!
//! 1. Built-in defaults ([`GatewayConfig::default`]).
//! 2. An optional file whose format is detected from its extension
//!    (`.toml`, `.yaml`/`.yml`, `.json`).
//! 3. `OKAPI_*` environment variables, `__` separating nested keys
//!    (`OKAPI_PORT=9131`, `OKAPI_DISCOVERY__MOD_USERS=...`).
//!
//! [`GatewayConfig::validate`] checks the result before the runtime starts.

use config::{Config as Cfg, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "OKAPI_CONFIG";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "OKAPI";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Runtime settings of the gateway process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen port.
    pub port: u16,
    /// URL under which modules reach the gateway (`X-Okapi-Url`).
    pub okapi_url: String,
    /// Timeout for each call to a module.
    pub request_timeout_ms: u64,
    /// Statically known module instances: module id → base URL.
    pub discovery: BTreeMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 9130,
            okapi_url: "http://localhost:9130".to_string(),
            request_timeout_ms: 30_000,
            discovery: BTreeMap::new(),
        }
    }
}

impl GatewayConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_okapi_url(mut self, url: impl Into<String>) -> Self {
        self.okapi_url = url.into();
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_instance(mut self, module_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.discovery.insert(module_id.into(), url.into());
        self
    }

    /// Load from the file named by `OKAPI_CONFIG` (if set) and the process
    /// environment.
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref(), Self::environment())
    }

    /// Load from an optional file plus the given environment source.
    pub fn load_from(path: Option<&str>, env: Environment) -> ConfigResult<Self> {
        let mut builder = Cfg::builder();
        if let Some(path) = path {
            let format = detect_format(path)?;
            let content = std::fs::read_to_string(path)?;
            builder = builder.add_source(File::from_str(&content, format));
        }
        let config: Self = builder
            .add_source(env)
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `OKAPI_*` variables with `__` for nesting.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Check invariants the runtime relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.okapi_url.trim().is_empty() {
            return Err(ConfigError::Invalid("okapi_url must not be empty".to_string()));
        }
        for (module, url) in &self.discovery {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "discovery url '{url}' for module '{module}' must be http(s)"
                )));
            }
        }
        Ok(())
    }
}

/// Detect the configuration format from a file extension.
pub fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
