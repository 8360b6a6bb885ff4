//! Cache entry CRUD operations.
//!
//! Entries live inside a namespace and are keyed by the hash of the request
//! method and canonical URL. Responses keep their status, status text, full
//! header list and body; the engine adds a `cached-at` header on write.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, TransactionBehavior};

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;

/// Header carrying the time an entry was written.
pub const CACHED_AT_HEADER: &str = "cached-at";

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub status_text: String,
    /// Header list in original order; names compare case-insensitively.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, status_text: impl Into<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { status, status_text: status_text.into(), headers, body }
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `name` with a single `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Copy of this response with `cached-at` set to `now`.
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.set_header(CACHED_AT_HEADER, now.to_rfc3339_opts(SecondsFormat::Millis, true));
        self
    }

    /// The `cached-at` time, if present and parseable.
    ///
    /// Entries without it were not written by the engine and have no
    /// known age.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.header(CACHED_AT_HEADER)?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                tracing::debug!(value = raw, error = %e, "ignoring unparseable cached-at header");
                None
            }
        }
    }

    /// Age at `now`, clamped at zero for timestamps in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.cached_at()
            .map(|t| now.signed_duration_since(t).max(TimeDelta::zero()))
    }

    /// Whether the entry is younger than `window`. Unstamped entries are never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age(now).is_some_and(|age| age < window_delta(window))
    }

    /// Whether the entry is older than `window`.
    ///
    /// Returns `None` for unstamped entries so callers can leave them alone.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> Option<bool> {
        self.age(now).map(|age| age > window_delta(window))
    }
}

fn window_delta(window: Duration) -> TimeDelta {
    TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX)
}

impl CacheDb {
    /// Create a namespace if it does not exist.
    ///
    /// Returns true if the namespace was created by this call.
    pub async fn create_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO cache_namespaces (name, created_at) VALUES (?1, ?2)",
                    params![name, Utc::now().to_rfc3339()],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List every namespace, oldest first.
    pub async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_namespaces ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// Returns false if the namespace did not exist.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the entry for `url` in `namespace`.
    ///
    /// The namespace is created if needed.
    pub async fn put_entry(&self, namespace: &str, url: &str, response: &CachedResponse) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let url = url.to_string();
        let key_hash = compute_request_key("GET", &url);
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let response = response.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let now = Utc::now().to_rfc3339();
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_namespaces (name, created_at) VALUES (?1, ?2)",
                    params![namespace, now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                    namespace, key_hash, url, status, status_text, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(namespace, key_hash) DO UPDATE SET
                    url = excluded.url,
                    status = excluded.status,
                    status_text = excluded.status_text,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        namespace,
                        key_hash,
                        url,
                        response.status,
                        response.status_text,
                        headers_json,
                        response.body,
                        now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `url` in `namespace`.
    ///
    /// Returns None if there is no entry.
    pub async fn match_entry(&self, namespace: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let namespace = namespace.to_string();
        let key_hash = compute_request_key("GET", url);
        let url = url.to_string();

        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, status_text, headers_json, body
                         FROM cache_entries WHERE namespace = ?1 AND key_hash = ?2",
                        params![namespace, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, u16>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, Vec<u8>>(3)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((status, status_text, headers_json, body)) = row else {
                    return Ok(None);
                };

                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
                    .map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;

                Ok(Some(CachedResponse { status, status_text, headers, body }))
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every entry in `namespace`.
    pub async fn entry_urls(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE namespace = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Overwrite the stored header list of an entry with unchecked JSON.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn set_entry_headers_raw(&self, namespace: &str, url: &str, headers_json: &str) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let key_hash = compute_request_key("GET", url);
        let headers_json = headers_json.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE cache_entries SET headers_json = ?3 WHERE namespace = ?1 AND key_hash = ?2",
                    params![namespace, key_hash, headers_json],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `url` in `namespace`.
    ///
    /// Returns false if there was no entry.
    pub async fn delete_entry(&self, namespace: &str, url: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let key_hash = compute_request_key("GET", url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND key_hash = ?2",
                    params![namespace, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
