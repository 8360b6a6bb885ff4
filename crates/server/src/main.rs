//! swcache server entry point.
//!
//! Loads configuration, opens the SQLite cache, installs the worker and
//! serves it as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_core::{AppConfig, CacheDb};
use swcache_worker::{Event, FetchConfig, HeadlessHost, HttpNetwork, WorkerContext};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(
        cache = %config.cache_name(),
        environment = config.environment.as_str(),
        db_path = %config.db_path.display(),
        "Starting swcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let network = HttpNetwork::new(FetchConfig::from_app_config(&config)?)?;
    let ctx = Arc::new(WorkerContext::new(config, db, Arc::new(network), Arc::new(HeadlessHost::new()))?);
    ctx.dispatch(Event::Install).await?;

    let handler = handler::SwCacheServer::new(ctx);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
