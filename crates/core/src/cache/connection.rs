//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::{CacheStorage, migrations};
use crate::{Error, Request, Response};
use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        self.open_partition(partition).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.partition_names().await
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        self.delete_partition(partition).await
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        self.find_entry(None, request).await
    }

    async fn match_in(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.find_entry(Some(partition), request).await
    }

    async fn put(&self, partition: &str, request: &Request, response: Response) -> Result<(), Error> {
        self.put_entries(partition, vec![(request.clone(), response)]).await
    }

    async fn put_all(&self, partition: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        self.put_entries(partition, entries).await
    }
}
