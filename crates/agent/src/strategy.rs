//! Strategy execution for classified requests.
//!
//! Store failures on these paths never reach the caller: a failed lookup is
//! a miss and a failed write is dropped, both logged at `warn`. Cache writes
//! run as background work on the event lifetime so the response is never
//! held back by the store.

use std::sync::Arc;

use mikra_core::{CacheStorage, Error, Network, Request, Response};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::classify::Strategy;
use crate::event::Lifetime;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Synthesized by the agent because the network failed.
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Response returned to the intercepted caller.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    /// `None` when the request bypassed the engine (worker not active).
    pub strategy: Option<Strategy>,
}

impl Served {
    fn new(response: Response, source: ResponseSource, strategy: Strategy) -> Self {
        Self { response, source, strategy: Some(strategy) }
    }
}

/// Runs the three caching strategies against the store and the network.
#[derive(Clone)]
pub struct StrategyExecutor {
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    partition: String,
    offline_message: String,
}

impl StrategyExecutor {
    /// `partition` receives every opportunistic write.
    pub fn new(
        store: Arc<dyn CacheStorage>, network: Arc<dyn Network>, partition: impl Into<String>,
        offline_message: impl Into<String>,
    ) -> Self {
        Self { store, network, partition: partition.into(), offline_message: offline_message.into() }
    }

    pub async fn execute(&self, strategy: Strategy, request: &Request, lifetime: &Lifetime) -> Result<Served, Error> {
        match strategy {
            Strategy::NetworkOnlyWithFallback => Ok(self.network_only_with_fallback(request).await),
            Strategy::CacheFirst => self.cache_first(request, lifetime).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, lifetime).await,
        }
    }

    /// Live data: the network response as-is, or a JSON error when offline.
    ///
    /// Never touches the store.
    pub async fn network_only_with_fallback(&self, request: &Request) -> Served {
        match self.network.fetch(request).await {
            Ok(response) => Served::new(response, ResponseSource::Network, Strategy::NetworkOnlyWithFallback),
            Err(e) => {
                tracing::warn!("live-data fetch failed for {}: {}", request.url(), e);
                Served::new(
                    Response::json_error(&self.offline_message),
                    ResponseSource::Fallback,
                    Strategy::NetworkOnlyWithFallback,
                )
            }
        }
    }

    /// Tiles: a cache hit is final. On a miss an ok network response is
    /// stored; anything else is returned uncached.
    pub async fn cache_first(&self, request: &Request, lifetime: &Lifetime) -> Result<Served, Error> {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!("cache hit for {}", request.url());
            return Ok(Served::new(cached, ResponseSource::Cache, Strategy::CacheFirst));
        }

        tracing::debug!("cache miss for {}", request.url());
        let response = self.network.fetch(request).await?;
        if response.ok() {
            self.store_in_background(request, &response, lifetime);
        } else {
            tracing::debug!("not caching {} response for {}", response.status, request.url());
        }

        Ok(Served::new(response, ResponseSource::Network, Strategy::CacheFirst))
    }

    /// Everything else: the lookup and the network refresh start together.
    ///
    /// A cached entry is returned at once while the refresh keeps running on
    /// the event lifetime. Without one the caller waits for the network; a
    /// network failure then surfaces as `Error::Network`.
    pub async fn stale_while_revalidate(&self, request: &Request, lifetime: &Lifetime) -> Result<Served, Error> {
        let (tx, rx) = oneshot::channel();
        let refresh = {
            let executor = self.clone();
            let request = request.clone();
            async move {
                let outcome = executor.network.fetch(&request).await;
                let fresh = match &outcome {
                    Ok(response) if response.ok() => Some(response.clone()),
                    _ => None,
                };
                // Nobody is listening once the cached entry was served.
                let _ = tx.send(outcome);
                if let Some(fresh) = fresh {
                    executor.put_logged(&request, fresh).await;
                }
            }
        };
        lifetime.wait_until(refresh);

        if let Some(cached) = self.lookup(request).await {
            tracing::debug!("serving stale {} while revalidating", request.url());
            return Ok(Served::new(cached, ResponseSource::Cache, Strategy::StaleWhileRevalidate));
        }

        match rx.await {
            Ok(Ok(response)) => Ok(Served::new(response, ResponseSource::Network, Strategy::StaleWhileRevalidate)),
            Ok(Err(e)) => {
                tracing::debug!("no cached entry and network failed for {}", request.url());
                Err(e)
            }
            Err(_) => Err(Error::Network(format!("revalidation of {} ended without a result", request.url()))),
        }
    }

    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.store.match_request(request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("cache lookup failed for {}: {}", request.url(), e);
                None
            }
        }
    }

    fn store_in_background(&self, request: &Request, response: &Response, lifetime: &Lifetime) {
        if !request.is_get() {
            tracing::debug!("not caching {} {}", request.method(), request.url());
            return;
        }

        let executor = self.clone();
        let request = request.clone();
        let stored = response.clone();
        lifetime.wait_until(async move { executor.put_logged(&request, stored).await });
    }

    async fn put_logged(&self, request: &Request, response: Response) {
        if !request.is_get() {
            return;
        }
        match self.store.put(&self.partition, request, response).await {
            Ok(()) => tracing::debug!("cached {} in {}", request.url(), self.partition),
            Err(e) => tracing::warn!("cache write failed for {}: {}", request.url(), e),
        }
    }
}
