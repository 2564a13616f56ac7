//! MCP tool implementations.
//!
//! Each tool is a thin adapter from JSON parameters to the worker, so the
//! same code paths run under the host and in tests.

pub mod cache;
pub mod fetch;
pub mod lifecycle;

pub use cache::{CacheKeysOutput, CacheMatchOutput, CacheMatchParams, keys_impl, match_impl};
pub use fetch::{AgentFetchOutput, AgentFetchParams, fetch_impl};
pub use lifecycle::{AgentStartOutput, start_impl};

use mikra_core::{Error, Request};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use url::Url;

/// Turn a tool URL argument into an absolute URL.
///
/// Paths starting with `/` or `.` resolve against the worker scope; anything
/// else goes through canonicalisation.
pub(crate) fn request_url(scope_url: &str, input: &str) -> Result<Url, Error> {
    let input = input.trim();
    if input.starts_with('/') || input.starts_with('.') {
        let scope = Url::parse(scope_url).map_err(|e| Error::InvalidUrl(format!("scope_url: {e}")))?;
        return mikra_client::resolve(&scope, input).map_err(|e| Error::InvalidUrl(e.to_string()));
    }
    mikra_client::canonicalize(input).map_err(|e| Error::InvalidUrl(e.to_string()))
}

pub(crate) fn get_request(scope_url: &str, input: &str) -> Result<Request, Error> {
    request_url(scope_url, input).map(Request::get)
}

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "http://localhost:8080/app/";

    #[test]
    fn test_request_url_relative() {
        assert_eq!(request_url(SCOPE, "./index.html").unwrap().as_str(), "http://localhost:8080/app/index.html");
        assert_eq!(request_url(SCOPE, "/manifest.json").unwrap().as_str(), "http://localhost:8080/manifest.json");
    }

    #[test]
    fn test_request_url_absolute() {
        assert_eq!(request_url(SCOPE, "tile.openstreetmap.org/1/1/1.png").unwrap().scheme(), "https");
        assert!(matches!(request_url(SCOPE, "ftp://example.com"), Err(Error::InvalidUrl(_))));
        assert!(matches!(request_url(SCOPE, "  "), Err(Error::InvalidUrl(_))));
    }
}
