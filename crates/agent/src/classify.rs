//! Request classification by host.

use std::fmt;

use mikra_core::{AgentConfig, HostMatch, Request};
use serde::Serialize;

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Always hit the network; never read or write the cache.
    NetworkOnlyWithFallback,
    /// Serve from cache when present, otherwise fetch and store.
    CacheFirst,
    /// Serve from cache immediately while refreshing it from the network.
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NetworkOnlyWithFallback => "NETWORK_ONLY_WITH_FALLBACK",
            Strategy::CacheFirst => "CACHE_FIRST",
            Strategy::StaleWhileRevalidate => "STALE_WHILE_REVALIDATE",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a request host to a strategy.
///
/// The API pattern is checked before the tile pattern, so a host matching
/// both is never served from cache.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_host: String,
    tile_host: String,
    mode: HostMatch,
}

impl Classifier {
    pub fn new(api_host: &str, tile_host: &str, mode: HostMatch) -> Self {
        Self { api_host: api_host.to_ascii_lowercase(), tile_host: tile_host.to_ascii_lowercase(), mode }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.api_host, &config.tile_host, config.host_match)
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        self.classify_host(request.host())
    }

    pub fn classify_host(&self, host: &str) -> Strategy {
        let host = host.to_ascii_lowercase();
        if self.mode.matches(&host, &self.api_host) {
            Strategy::NetworkOnlyWithFallback
        } else if self.mode.matches(&host, &self.tile_host) {
            Strategy::CacheFirst
        } else {
            Strategy::StaleWhileRevalidate
        }
    }
}
