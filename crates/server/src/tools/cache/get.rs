//! cache_get tool implementation.
//!
//! Retrieves the cached response for a URL from the current namespace.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;
use swcache_worker::WorkerContext;

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path relative to the configured origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub url: String,
    pub namespace: String,
    pub status: u16,
    pub status_text: String,
    /// Value of the `cached-at` header, if the entry has one.
    pub cached_at: Option<String>,
    /// Whether the entry is still inside the expiration window.
    pub fresh: bool,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(ctx: &WorkerContext, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let entry = ctx
        .cache_lookup(&params.url)
        .await?
        .ok_or_else(|| Error::CacheMiss(params.url.clone()))?;

    let output = CacheGetOutput {
        url: params.url,
        namespace: ctx.namespace().name().to_string(),
        status: entry.status,
        status_text: entry.status_text.clone(),
        cached_at: entry.cached_at().map(|t| t.to_rfc3339()),
        fresh: entry.is_fresh(chrono::Utc::now(), ctx.config().expiration()),
        headers: entry.headers.clone(),
        body: String::from_utf8_lossy(&entry.body).into_owned(),
    };

    json_result(&output)
}
