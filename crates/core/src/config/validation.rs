//! Configuration validation rules.
//!
//! This module provides validation logic for `AgentConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AgentConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AgentConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version_tag`, `user_agent`, `api_host` or `tile_host` is empty
    /// - `api_host` and `tile_host` are identical
    /// - `scope_url` is not an absolute http(s) URL
    /// - a `precache_manifest` entry is blank
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version_tag.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "version_tag".into(), reason: "must not be empty".into() });
        }

        if self.api_host.is_empty() {
            return Err(ConfigError::Invalid { field: "api_host".into(), reason: "must not be empty".into() });
        }
        if self.tile_host.is_empty() {
            return Err(ConfigError::Invalid { field: "tile_host".into(), reason: "must not be empty".into() });
        }
        if self.api_host == self.tile_host {
            return Err(ConfigError::Invalid {
                field: "tile_host".into(),
                reason: "must differ from api_host".into(),
            });
        }

        match url::Url::parse(&self.scope_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    field: "scope_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "scope_url".into(), reason: e.to_string() });
            }
        }

        if let Some(pos) = self.precache_manifest.iter().position(|entry| entry.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: format!("entry {pos} is empty"),
            });
        }
        if self.precache_manifest.is_empty() {
            tracing::warn!("precache_manifest is empty; install will seed nothing");
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
