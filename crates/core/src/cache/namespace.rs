//! Handle on one named cache namespace.

use std::sync::Arc;

use super::connection::CacheDb;
use super::entries::CachedResponse;
use crate::Error;

/// A single versioned cache, e.g. `site-name-v1.0.0`.
///
/// Thin wrapper that pins a namespace name onto the shared [`CacheDb`].
#[derive(Clone, Debug)]
pub struct CacheNamespace {
    db: CacheDb,
    name: Arc<str>,
}

impl CacheNamespace {
    /// Open a namespace, creating it if needed.
    pub async fn open(db: &CacheDb, name: &str) -> Result<Self, Error> {
        if db.create_namespace(name).await? {
            tracing::info!(namespace = name, "created cache namespace");
        }
        Ok(Self::attach(db, name))
    }

    /// Bind to a namespace without touching the database.
    ///
    /// The namespace row is created lazily on the first write.
    pub fn attach(db: &CacheDb, name: &str) -> Self {
        Self { db: db.clone(), name: Arc::from(name) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub async fn put(&self, url: &str, response: &CachedResponse) -> Result<(), Error> {
        self.db.put_entry(&self.name, url, response).await
    }

    pub async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>, Error> {
        self.db.match_entry(&self.name, url).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db.entry_urls(&self.name).await
    }

    pub async fn delete(&self, url: &str) -> Result<bool, Error> {
        self.db.delete_entry(&self.name, url).await
    }
}
