//! Persisted worker state.
//!
//! A small key-value table, separate from the cache namespaces, holding
//! epoch-millisecond timestamps that must survive restarts. Values are stored
//! as text; anything that does not parse as an integer is treated as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use super::connection::CacheDb;
use crate::Error;

/// Set once, the first time the worker installs.
pub const INSTALLED_AT_KEY: &str = "sw-installed-at";

/// Set each time a cleanup batch is scheduled. Never moves backwards.
pub const LAST_CLEANUP_KEY: &str = "sw-last-cleanup";

/// Snapshot of the persisted cleanup timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupState {
    pub installed_at: Option<i64>,
    pub last_cleanup: Option<i64>,
}

impl CleanupState {
    pub fn installed_at_time(&self) -> Option<DateTime<Utc>> {
        self.installed_at.and_then(DateTime::from_timestamp_millis)
    }

    pub fn last_cleanup_time(&self) -> Option<DateTime<Utc>> {
        self.last_cleanup.and_then(DateTime::from_timestamp_millis)
    }
}

fn read_millis(conn: &Connection, key: &str) -> Result<Option<i64>, Error> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM worker_state WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;

    Ok(raw.and_then(|value| match value.trim().parse::<i64>() {
        Ok(millis) => Some(millis),
        Err(e) => {
            tracing::warn!(key, value = %value, error = %e, "ignoring malformed worker state value");
            None
        }
    }))
}

fn write_raw(conn: &Connection, key: &str, value: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO worker_state (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl CacheDb {
    /// Read a timestamp. Malformed values read as `None`.
    pub async fn get_state_millis(&self, key: &str) -> Result<Option<i64>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| read_millis(conn, &key))
            .await
            .map_err(Error::from)
    }

    /// Store `millis` unless a valid value already exists.
    ///
    /// Returns the value in effect after the call.
    pub async fn set_state_millis_if_absent(&self, key: &str, millis: i64) -> Result<i64, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let effective = match read_millis(&tx, &key)? {
                    Some(existing) => existing,
                    None => {
                        write_raw(&tx, &key, &millis.to_string())?;
                        millis
                    }
                };
                tx.commit()?;
                Ok(effective)
            })
            .await
            .map_err(Error::from)
    }

    /// Store `millis` if it is later than the current value.
    ///
    /// Returns the value in effect after the call, which is never smaller
    /// than the value before it.
    pub async fn advance_state_millis(&self, key: &str, millis: i64) -> Result<i64, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let effective = match read_millis(&tx, &key)? {
                    Some(existing) if existing >= millis => existing,
                    _ => {
                        write_raw(&tx, &key, &millis.to_string())?;
                        millis
                    }
                };
                tx.commit()?;
                Ok(effective)
            })
            .await
            .map_err(Error::from)
    }

    /// Read both cleanup timestamps.
    pub async fn cleanup_state(&self) -> Result<CleanupState, Error> {
        self.conn
            .call(|conn| -> Result<CleanupState, Error> {
                Ok(CleanupState {
                    installed_at: read_millis(conn, INSTALLED_AT_KEY)?,
                    last_cleanup: read_millis(conn, LAST_CLEANUP_KEY)?,
                })
            })
            .await
            .map_err(Error::from)
    }

    #[cfg(test)]
    pub(crate) async fn set_state_raw(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| write_raw(conn, &key, &value))
            .await
            .map_err(Error::from)
    }
}
