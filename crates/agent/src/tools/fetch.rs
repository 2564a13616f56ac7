//! agent_fetch tool implementation.
//!
//! Delivers one fetch event to the worker and reports what was served.

use std::collections::BTreeMap;

use mikra_core::{Error, Request};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::worker::Worker;

/// Input parameters for the agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// URL to fetch. Paths starting with `/` or `.` resolve against the scope URL.
    pub url: String,

    /// HTTP method (default: GET). Only GET responses are ever cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchOutput {
    pub url: String,
    pub status: u16,
    pub ok: bool,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// "network", "cache" or "fallback".
    pub source: String,
    /// Strategy label, absent when the worker does not control clients yet.
    pub strategy: Option<String>,
}

fn build_request(worker: &Worker, params: &AgentFetchParams) -> Result<Request, Error> {
    let method = params.method.trim();
    if method.is_empty() {
        return Err(Error::InvalidInput("method must not be empty".into()));
    }

    let url = super::request_url(&worker.config().scope_url, &params.url)?;
    let request = params
        .headers
        .iter()
        .fold(Request::new(method, url), |request, (name, value)| request.with_header(name, value));
    Ok(request)
}

/// Implementation of the agent_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    let output = fetch_output(worker, &params).await?;
    super::json_result(&output)
}

pub(crate) async fn fetch_output(worker: &Worker, params: &AgentFetchParams) -> Result<AgentFetchOutput, Error> {
    let request = build_request(worker, params)?;
    let url = request.url().to_string();

    let served = worker
        .dispatch(Event::Fetch(request))
        .await?
        .into_served()
        .ok_or_else(|| Error::InvalidInput("fetch event produced no response".into()))?;

    Ok(AgentFetchOutput {
        url,
        status: served.response.status,
        ok: served.response.ok(),
        body: served.response.text(),
        headers: served.response.headers,
        source: served.source.as_str().to_string(),
        strategy: served.strategy.map(|s| s.as_str().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mikra_core::{AgentConfig, CacheDb, CacheStorage, Network, Response};
    use std::sync::Arc;

    /// Echoes the request method and one header back in the body.
    struct EchoNetwork;

    #[async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            let body = format!("{} {}", request.method(), request.header("x-trace").unwrap_or("-"));
            Ok(Response::new(200, vec![("Content-Type".into(), "text/plain".into())], body))
        }
    }

    struct OfflineNetwork;

    #[async_trait]
    impl Network for OfflineNetwork {
        async fn fetch(&self, _request: &Request) -> Result<Response, Error> {
            Err(Error::Network("offline".into()))
        }
    }

    async fn started_worker() -> (Worker, Arc<CacheDb>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let config = AgentConfig { precache_manifest: vec![], ..Default::default() };
        let worker = Worker::new(config, db.clone(), Arc::new(EchoNetwork)).unwrap();
        worker.start().await.unwrap();
        (worker, db)
    }

    fn params(url: &str) -> AgentFetchParams {
        serde_json::from_value(serde_json::json!({ "url": url })).unwrap()
    }

    #[test]
    fn test_params_defaults() {
        let p = params("/index.html");
        assert_eq!(p.method, "GET");
        assert!(p.headers.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_output_reports_strategy() {
        let (worker, _) = started_worker().await;

        let output = fetch_output(&worker, &params("https://tile.openstreetmap.org/3/1/1.png")).await.unwrap();

        assert_eq!(output.status, 200);
        assert!(output.ok);
        assert_eq!(output.source, "network");
        assert_eq!(output.strategy.as_deref(), Some("CACHE_FIRST"));
        assert_eq!(output.body, "GET -");
    }

    #[tokio::test]
    async fn test_fetch_output_reports_fallback_source() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let config = AgentConfig { precache_manifest: vec![], ..Default::default() };
        let worker = Worker::new(config, db, Arc::new(OfflineNetwork)).unwrap();
        worker.start().await.unwrap();

        let output = fetch_output(&worker, &params("https://api.mercadolibre.com/items/1")).await.unwrap();
        assert_eq!(output.source, "fallback");
        assert_eq!(output.strategy.as_deref(), Some("NETWORK_ONLY_WITH_FALLBACK"));
    }

    #[tokio::test]
    async fn test_fetch_forwards_method_and_headers() {
        let (worker, db) = started_worker().await;
        let mut p = params("/submit");
        p.method = "post".into();
        p.headers.insert("X-Trace".into(), "abc".into());

        let output = fetch_output(&worker, &p).await.unwrap();

        assert_eq!(output.url, "http://localhost:8080/submit");
        assert_eq!(output.body, "POST abc");
        assert_eq!(output.strategy.as_deref(), Some("STALE_WHILE_REVALIDATE"));
        assert!(db.match_request(&Request::get(url::Url::parse(&output.url).unwrap())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_rejects_blank_method() {
        let (worker, _) = started_worker().await;
        let mut p = params("/");
        p.method = " ".into();
        assert!(matches!(fetch_output(&worker, &p).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_impl_returns_json() {
        let (worker, _) = started_worker().await;
        let result = fetch_impl(&worker, params("https://api.mercadolibre.com/items/1")).await;
        assert!(result.is_ok());
    }
}
