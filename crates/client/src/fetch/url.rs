//! URL parsing for intercepted requests and manifest entries.

use url::Url;

/// Error type for URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Only http(s) URLs are fetchable; fragments never leave the client.
fn finish(mut url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
    url.set_fragment(None);
    Ok(url)
}

/// Canonicalize an absolute URL string.
///
/// Trims whitespace, defaults a missing scheme to `https://`, lower-cases
/// the host and drops the fragment. The query is kept verbatim.
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{trimmed}"))
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    finish(parsed)
}

/// Resolve a manifest entry against the application scope.
///
/// Relative entries (`./`, `./index.html`, `/app.js`) join onto `base`;
/// absolute entries are taken as they are.
pub fn resolve(base: &Url, entry: &str) -> Result<Url, UrlError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    finish(joined)
}
