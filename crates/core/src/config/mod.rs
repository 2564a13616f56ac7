//! Agent configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MIKRA_*)
//! 2. TOML config file (if MIKRA_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is immutable; the engine receives it once at start.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// How a request host is compared against a classification pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMatch {
    /// Pattern appears anywhere in the host.
    #[default]
    Substring,
    /// Host equals the pattern or is a subdomain of it.
    Suffix,
    /// Host equals the pattern.
    Exact,
}

impl HostMatch {
    /// Compare a lower-cased host against a pattern.
    pub fn matches(self, host: &str, pattern: &str) -> bool {
        match self {
            HostMatch::Substring => host.contains(pattern),
            HostMatch::Suffix => {
                host == pattern
                    || host
                        .strip_suffix(pattern)
                        .is_some_and(|rest| rest.ends_with('.'))
            }
            HostMatch::Exact => host == pattern,
        }
    }
}

/// Agent configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MIKRA_*)
/// 2. TOML config file (if MIKRA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name of the current cache generation.
    ///
    /// Set via MIKRA_VERSION_TAG environment variable.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Resources seeded into the cache during install, in order.
    ///
    /// Relative entries resolve against `scope_url`.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Base URL of the hosting application.
    ///
    /// Set via MIKRA_SCOPE_URL environment variable.
    #[serde(default = "default_scope_url")]
    pub scope_url: String,

    /// Host pattern of the live-data API. Requests to it are never cached.
    ///
    /// Set via MIKRA_API_HOST environment variable.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Host pattern of the map-tile server. Requests to it are cache-first.
    ///
    /// Set via MIKRA_TILE_HOST environment variable.
    #[serde(default = "default_tile_host")]
    pub tile_host: String,

    /// Host comparison mode for `api_host` and `tile_host`.
    ///
    /// Set via MIKRA_HOST_MATCH environment variable (substring, suffix, exact).
    #[serde(default)]
    pub host_match: HostMatch,

    /// Message carried in the synthesized offline reply of the API path.
    ///
    /// Set via MIKRA_OFFLINE_MESSAGE environment variable.
    #[serde(default = "default_offline_message")]
    pub offline_message: String,

    /// Path to the SQLite cache store.
    ///
    /// Set via MIKRA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via MIKRA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via MIKRA_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_version_tag() -> String {
    "flex-mikra-v1".into()
}

fn default_precache_manifest() -> Vec<String> {
    vec![
        "./".into(),
        "./index.html".into(),
        "./manifest.json".into(),
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css".into(),
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".into(),
    ]
}

fn default_scope_url() -> String {
    "http://localhost:8080/".into()
}

fn default_api_host() -> String {
    "api.mercadolibre.com".into()
}

fn default_tile_host() -> String {
    "tile.openstreetmap.org".into()
}

fn default_offline_message() -> String {
    "Sin conexión".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mikra-cache.sqlite")
}

fn default_user_agent() -> String {
    "mikra/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version_tag: default_version_tag(),
            precache_manifest: default_precache_manifest(),
            scope_url: default_scope_url(),
            api_host: default_api_host(),
            tile_host: default_tile_host(),
            host_match: HostMatch::default(),
            offline_message: default_offline_message(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AgentConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MIKRA_`
    /// 2. TOML file from `MIKRA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MIKRA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MIKRA_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
