//! SQLite-backed durable cache for intercepted responses.
//!
//! This module provides persistent, versioned cache namespaces using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named namespaces (`<site>-v<version>`) holding request→response entries
//! - `cached-at` stamping and age checks on stored responses
//! - A small key-value table for worker state that survives restarts
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespace;
pub mod state;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CACHED_AT_HEADER, CachedResponse};
pub use namespace::CacheNamespace;
pub use state::{CleanupState, INSTALLED_AT_KEY, LAST_CLEANUP_KEY};
