//! Network collaborator contract.

use async_trait::async_trait;

use crate::{Error, Request, Response};

/// Performs a single network fetch for a request.
///
/// Implementations return `Error::Network` only when no response was
/// produced at all. A non-2xx response is returned as `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
