//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Durable cache namespaces and worker state with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CACHED_AT_HEADER, CacheDb, CacheNamespace, CachedResponse, CleanupState};
pub use config::{AppConfig, ConfigError, Environment, RuleConfig, Strategy};
pub use error::Error;
