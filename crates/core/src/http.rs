//! Request and response values exchanged between the engine, the cache
//! store and the network.
//!
//! Both are immutable once built. A `Response` body is a reference-counted
//! `Bytes`, so the clone stored in the cache and the original returned to
//! the caller share nothing mutable and are always content-equal.

use bytes::Bytes;
use url::Url;

/// Ordered header list. Names compare case-insensitively.
pub type Headers = Vec<(String, String)>;

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// An outgoing HTTP call intercepted by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
    headers: Headers,
}

impl Request {
    /// Build a request with the given method. The method is upper-cased.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new() }
    }

    /// Build a GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Host (authority without port) used for classification.
    ///
    /// Returns an empty string for URLs without a host.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// A response produced by the network, the cache store or the agent itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// Synthesized offline reply for the live-data path.
    ///
    /// Status 200 with a `{"error": message}` JSON body, so the application
    /// can detect the offline state by parsing the payload.
    pub fn json_error(message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(200, vec![("Content-Type".to_string(), "application/json".to_string())], body)
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
