//! cache_keys and cache_match tool implementations.
//!
//! Read-only views of the cache store. Neither tool touches the network.

use mikra_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::worker::Worker;

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Partition names in creation order.
    pub partitions: Vec<String>,
    /// The partition the worker writes to.
    pub current: String,
}

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// URL to look up (GET). Paths starting with `/` or `.` resolve against the scope URL.
    pub url: String,

    /// Restrict the lookup to one partition. Searches every partition when absent.
    #[serde(default)]
    pub partition: Option<String>,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub url: String,
    pub hit: bool,
    pub status: Option<u16>,
    pub headers: Option<Vec<(String, String)>>,
    pub body: Option<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let partitions = worker.store().keys().await?;
    let output = CacheKeysOutput { partitions, current: worker.config().version_tag.clone() };
    super::json_result(&output)
}

/// Implementation of the cache_match tool.
pub async fn match_impl(worker: &Worker, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let output = match_output(worker, &params).await?;
    super::json_result(&output)
}

pub(crate) async fn match_output(worker: &Worker, params: &CacheMatchParams) -> Result<CacheMatchOutput, Error> {
    let request = super::get_request(&worker.config().scope_url, &params.url)?;
    let store = worker.store();

    let found = match params.partition.as_deref() {
        Some(partition) => store.match_in(partition, &request).await?,
        None => store.match_request(&request).await?,
    };

    let url = request.url().to_string();
    Ok(match found {
        Some(response) => CacheMatchOutput {
            url,
            hit: true,
            status: Some(response.status),
            body: Some(response.text()),
            headers: Some(response.headers),
        },
        None => CacheMatchOutput { url, hit: false, status: None, headers: None, body: None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mikra_core::{AgentConfig, CacheDb, CacheStorage, Network, Request, Response};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    #[derive(Default)]
    struct CountingNetwork(AtomicUsize);

    #[async_trait]
    impl Network for CountingNetwork {
        async fn fetch(&self, _request: &Request) -> Result<Response, Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::Network("offline".into()))
        }
    }

    async fn worker() -> (Worker, Arc<CacheDb>, Arc<CountingNetwork>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let net = Arc::new(CountingNetwork::default());
        let config = AgentConfig { precache_manifest: vec![], ..Default::default() };
        (Worker::new(config, db.clone(), net.clone()).unwrap(), db, net)
    }

    fn match_params(url: &str, partition: Option<&str>) -> CacheMatchParams {
        CacheMatchParams { url: url.into(), partition: partition.map(str::to_string) }
    }

    #[tokio::test]
    async fn test_match_hit_and_miss() {
        let (worker, db, net) = worker().await;
        let page = Request::get(Url::parse("http://localhost:8080/index.html").unwrap());
        db.put("flex-mikra-v1", &page, Response::new(200, vec![("ETag".into(), "\"1\"".into())], "<html>"))
            .await
            .unwrap();

        let hit = match_output(&worker, &match_params("./index.html", None)).await.unwrap();
        assert!(hit.hit);
        assert_eq!(hit.status, Some(200));
        assert_eq!(hit.body.as_deref(), Some("<html>"));
        assert_eq!(hit.headers.unwrap()[0].1, "\"1\"");

        let miss = match_output(&worker, &match_params("./other.html", None)).await.unwrap();
        assert!(!miss.hit);
        assert!(miss.body.is_none());

        assert_eq!(net.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_match_scoped_to_partition() {
        let (worker, db, _) = worker().await;
        let page = Request::get(Url::parse("http://localhost:8080/").unwrap());
        db.put("flex-mikra-v0", &page, Response::new(200, vec![], "old")).await.unwrap();

        let scoped = match_output(&worker, &match_params("/", Some("flex-mikra-v1"))).await.unwrap();
        assert!(!scoped.hit);

        let anywhere = match_output(&worker, &match_params("/", None)).await.unwrap();
        assert_eq!(anywhere.body.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_keys_impl() {
        let (worker, db, _) = worker().await;
        db.open("flex-mikra-v1").await.unwrap();
        assert!(keys_impl(&worker).await.is_ok());
    }
}
