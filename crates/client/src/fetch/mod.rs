//! HTTP fetch pipeline backing the agent's network collaborator.
//!
//! ### Semantics
//! - One attempt per request, no retries.
//! - Any HTTP status is a response, including 4xx/5xx. Only a failure to
//!   obtain a response at all (connect, DNS, TLS, timeout, body read) is an
//!   error, reported as `Error::Network`.
//! - Max redirects: 5. The timeout is the only time limit.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve};

use mikra_core::{Error, Network, Request, Response};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "mikra/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "mikra/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl FetchConfig {
    /// Fetch settings derived from the agent configuration.
    pub fn from_agent(config: &mikra_core::AgentConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// reqwest-backed network client.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method(), e)))?;

        let mut builder = self.http.request(method, request.url().as_str());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url(), e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {}: {}", request.url(), e)))?;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method(),
            request.url(),
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(server: &MockServer, p: &str) -> Request {
        Request::get(canonicalize(&format!("{}{}", server.uri(), p)).unwrap())
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "mikra/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_agent() {
        let agent = mikra_core::AgentConfig { user_agent: "flex/2".into(), timeout_ms: 750, ..Default::default() };
        let config = FetchConfig::from_agent(&agent);
        assert_eq!(config.user_agent, "flex/2");
        assert_eq!(config.timeout, Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        assert!(FetchClient::new(FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html></html>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let response = client.fetch(&request(&server, "/index.html")).await.unwrap();

        assert!(response.ok());
        assert_eq!(response.text(), "<html></html>");
        assert_eq!(response.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let response = client.fetch(&request(&server, "/missing")).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn test_fetch_forwards_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let response = client
            .fetch(&request(&server, "/items").with_header("Accept", "application/json"))
            .await
            .unwrap();

        assert_eq!(response.text(), "[]");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let req = Request::get(canonicalize(&format!("http://127.0.0.1:{port}/gone")).unwrap());

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch(&req).await;

        assert!(matches!(result, Err(Error::Network(_))));
    }
}
