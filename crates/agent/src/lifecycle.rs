//! Install and activate transitions.
//!
//! Install is all-or-nothing: every manifest entry is fetched first and the
//! partition is only written once all of them succeeded, in one store
//! transaction. Activate keeps exactly one partition, the current one.

use futures_util::future::try_join_all;
use mikra_core::{AgentConfig, CacheStorage, Error, Network, Request};
use serde::Serialize;
use url::Url;

use crate::event::ClientSignal;

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub partition: String,
    /// Manifest URLs now stored, in manifest order.
    pub cached: Vec<String>,
    pub signal: ClientSignal,
}

/// Result of a successful activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateOutcome {
    pub partition: String,
    /// Stale partitions removed, in creation order.
    pub deleted: Vec<String>,
    pub signal: ClientSignal,
}

/// Resolve the configured manifest into GET requests.
///
/// Relative entries resolve against `scope_url`.
pub fn manifest_requests(config: &AgentConfig) -> Result<Vec<Request>, Error> {
    let scope = Url::parse(&config.scope_url).map_err(|e| Error::InvalidUrl(format!("scope_url: {e}")))?;

    config
        .precache_manifest
        .iter()
        .map(|entry| {
            mikra_client::resolve(&scope, entry)
                .map(Request::get)
                .map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))
        })
        .collect()
}

/// Seed `partition` with every manifest entry.
///
/// # Errors
///
/// Returns `Error::InstallFailed` if any entry cannot be fetched or its
/// response is not ok. Nothing is written in that case, not even the
/// partition itself.
pub async fn install(
    partition: &str, manifest: &[Request], store: &dyn CacheStorage, network: &dyn Network,
) -> Result<InstallOutcome, Error> {
    let fetches = manifest.iter().map(|request| async move {
        let response = network
            .fetch(request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{}: {}", request.url(), e)))?;
        if !response.ok() {
            return Err(Error::InstallFailed(format!("{}: status {}", request.url(), response.status)));
        }
        Ok((request.clone(), response))
    });
    let entries = try_join_all(fetches).await?;

    let cached = entries.iter().map(|(request, _)| request.url().to_string()).collect();
    store.put_all(partition, entries).await?;

    tracing::info!(partition, entries = manifest.len(), "install complete");

    Ok(InstallOutcome { partition: partition.to_string(), cached, signal: ClientSignal::SkipWaiting })
}

/// Delete every partition other than `partition`.
pub async fn activate(partition: &str, store: &dyn CacheStorage) -> Result<ActivateOutcome, Error> {
    let stale: Vec<String> = store
        .keys()
        .await?
        .into_iter()
        .filter(|name| name != partition)
        .collect();

    let removed = try_join_all(stale.iter().map(|name| store.delete(name))).await?;
    let deleted: Vec<String> = stale
        .into_iter()
        .zip(removed)
        .filter_map(|(name, existed)| existed.then_some(name))
        .collect();

    for name in &deleted {
        tracing::info!(partition = name.as_str(), "deleted stale cache partition");
    }
    tracing::info!(partition, "activate complete");

    Ok(ActivateOutcome { partition: partition.to_string(), deleted, signal: ClientSignal::ClaimClients })
}
