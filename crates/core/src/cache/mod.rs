//! Partitioned response cache.
//!
//! The engine talks to the cache store only through `CacheStorage`: a set of
//! named partitions, each mapping a request key to a stored response. The
//! store owns persistence; the engine never manages it.
//!
//! `CacheDb` is the SQLite-backed implementation, with async access via
//! tokio-rusqlite. It supports:
//!
//! - Request keys derived from method and canonical URL (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-partition deletion with cascading entry removal

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;

use async_trait::async_trait;

pub use crate::Error;
use crate::{Request, Response};

pub use connection::CacheDb;

/// Cache store contract consumed by the engine.
///
/// Only GET requests are storable: `put` rejects other methods with
/// `Error::UnsupportedMethod` and lookups for them return `None`.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a partition, creating it if absent. Idempotent.
    async fn open(&self, partition: &str) -> Result<(), Error>;

    /// List partition names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a partition and all of its entries.
    ///
    /// Returns whether the partition existed.
    async fn delete(&self, partition: &str) -> Result<bool, Error>;

    /// Look a request up across every partition, oldest partition first.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Look a request up in one partition.
    async fn match_in(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Store a response under the request key, replacing any previous entry.
    ///
    /// Opens the partition if needed.
    async fn put(&self, partition: &str, request: &Request, response: Response) -> Result<(), Error>;

    /// Store several entries atomically: either all are written or none.
    async fn put_all(&self, partition: &str, entries: Vec<(Request, Response)>) -> Result<(), Error>;
}
