//! cache_purge tool implementation.
//!
//! Deletes one entry, or every entry, from the current namespace.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;
use swcache_worker::WorkerContext;

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge the entry for this URL.
    pub url: Option<String>,

    /// Purge every entry in the current namespace.
    #[serde(default)]
    pub all: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: usize,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(ctx: &WorkerContext, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = match (params.url.as_deref(), params.all) {
        (Some(_), true) => {
            return Err(Error::InvalidInput("url and all are mutually exclusive".to_string()).into());
        }
        (None, false) => {
            return Err(Error::InvalidInput("One of url or all must be specified".to_string()).into());
        }
        (Some(url), false) => ctx.cache_purge(Some(url)).await?,
        (None, true) => ctx.cache_purge(None).await?,
    };

    json_result(&CachePurgeOutput { deleted })
}
