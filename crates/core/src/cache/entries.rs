//! Stored response lookups and writes.

use super::connection::CacheDb;
use super::hash::request_key;
use crate::http::Headers;
use crate::{Error, Request, Response};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Row ready for insertion: (request_key, url, status, headers_json, body).
type EntryRow = (String, String, u16, String, Vec<u8>);

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u16, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn encode_entry(request: &Request, response: &Response) -> Result<EntryRow, Error> {
    let headers_json =
        serde_json::to_string(&response.headers).map_err(|e| Error::MalformedHeaders(e.to_string()))?;
    let mut url = request.url().clone();
    url.set_fragment(None);
    Ok((request_key(request), url.to_string(), response.status, headers_json, response.body.to_vec()))
}

impl CacheDb {
    /// Find the stored response for a request.
    ///
    /// With `partition` set, only that partition is searched. Otherwise all
    /// partitions are searched in creation order and the first hit wins.
    /// Non-GET requests never match.
    pub async fn find_entry(&self, partition: Option<&str>, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }

        let key = request_key(request);
        let partition = partition.map(str::to_string);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let result = match &partition {
                    Some(name) => conn.query_row(
                        "SELECT status, headers_json, body FROM entries
                        WHERE partition = ?1 AND request_key = ?2",
                        params![name, key],
                        read_entry,
                    ),
                    None => conn.query_row(
                        "SELECT e.status, e.headers_json, e.body FROM entries e
                        JOIN partitions p ON p.name = e.partition
                        WHERE e.request_key = ?1
                        ORDER BY p.rowid LIMIT 1",
                        params![key],
                        read_entry,
                    ),
                };

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers: Headers = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::MalformedHeaders(e.to_string()))?;
                        Ok(Some(Response::new(status, headers, body)))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace entries in a partition within one transaction.
    ///
    /// Creates the partition if absent. Rejects the whole batch if any
    /// request is not a GET.
    pub async fn put_entries(&self, partition: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        if let Some((request, _)) = entries.iter().find(|(request, _)| !request.is_get()) {
            return Err(Error::UnsupportedMethod(format!("{} {}", request.method(), request.url())));
        }

        let rows = entries
            .iter()
            .map(|(request, response)| encode_entry(request, response))
            .collect::<Result<Vec<_>, Error>>()?;
        let partition = partition.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO partitions (name, created_at) VALUES (?1, ?2)
                    ON CONFLICT(name) DO NOTHING",
                    params![&partition, &now],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (
                            partition, request_key, method, url, status, headers_json, body, stored_at
                        ) VALUES (?1, ?2, 'GET', ?3, ?4, ?5, ?6, ?7)
                        ON CONFLICT(partition, request_key) DO UPDATE SET
                            url = excluded.url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for (key, url, status, headers_json, body) in &rows {
                        stmt.execute(params![&partition, key, url, status, headers_json, body, &now])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
