//! Request key generation.

use sha2::{Digest, Sha256};
use url::Url;

use crate::Request;

/// Compute the cache key for a method and URL.
///
/// The fragment never reaches the network, so it is dropped. The query is
/// kept verbatim.
pub fn compute_request_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key of a request.
pub fn request_key(request: &Request) -> String {
    compute_request_key(request.method(), request.url())
}
