//! Configuration loading via `figment`.
//!
//! Precedence, lowest to highest: built-in defaults, `./config.toml`
//! if present, then environment variables prefixed `WS_`. Every field
//! carries a `#[serde(default = "...")]` function so a config file (or
//! no config file at all) only needs to mention what it overrides.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::auth::AuthConfig;
use crate::error::Result;
use crate::session::SessionConfig;

fn default_endpoints() -> Vec<String> {
    vec!["/ws".to_string(), "/bunchy".to_string()]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

/// Server-wide WebSocket hosting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Endpoint paths to mount and manage, e.g. `/ws`, `/bunchy`.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level for `observability::init_tracing`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            ping_interval_secs: default_ping_interval_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_reconnect_backoff_base_ms() -> u64 {
    250
}

fn default_reconnect_backoff_cap_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Client runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_reconnect_backoff_base_ms")]
    pub reconnect_backoff_base_ms: u64,

    #[serde(default = "default_reconnect_backoff_cap_ms")]
    pub reconnect_backoff_cap_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_base_ms: default_reconnect_backoff_base_ms(),
            reconnect_backoff_cap_ms: default_reconnect_backoff_cap_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_http_capacity() -> usize {
    500
}

fn default_ws_capacity() -> usize {
    500
}

fn default_log_capacity() -> usize {
    500
}

fn default_error_capacity() -> usize {
    200
}

/// Dev-context ring buffer capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevContextConfig {
    #[serde(default = "default_http_capacity")]
    pub http_capacity: usize,

    #[serde(default = "default_ws_capacity")]
    pub ws_capacity: usize,

    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
}

impl Default for DevContextConfig {
    fn default() -> Self {
        Self {
            http_capacity: default_http_capacity(),
            ws_capacity: default_ws_capacity(),
            log_capacity: default_log_capacity(),
            error_capacity: default_error_capacity(),
        }
    }
}

/// The top-level, figment-loaded configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub devcontext: DevContextConfig,
}

impl Config {
    /// Load configuration from `./config.toml` (if present) layered
    /// under defaults, then environment variables prefixed `WS_`.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file, bypassing the default
    /// search path. Used by tests and non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if std::path::Path::new(path).exists() {
            tracing::info!("loading configuration from {path}");
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("WS_").split("_"));

        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_endpoints_and_port() {
        let config = Config::default();
        assert_eq!(config.server.endpoints, vec!["/ws", "/bunchy"]);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let config = Config::load_from("definitely-does-not-exist.toml").unwrap();
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn env_var_overrides_default() {
        std::env::set_var("WS_SERVER_PORT", "9999");
        let config = Config::load_from("definitely-does-not-exist.toml").unwrap();
        std::env::remove_var("WS_SERVER_PORT");
        assert_eq!(config.server.port, 9999);
    }
}
