//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod cache;
pub mod sw_control;
pub mod sw_fetch;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swcache_core::Error;

pub use sw_control::{SwCleanupStatusOutput, config_impl, status_impl};
pub use sw_fetch::{SwFetchOutput, SwFetchParams, fetch_impl};

/// Pretty-printed JSON tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::Arc;

    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use swcache_core::{AppConfig, CacheDb};
    use swcache_worker::{FetchConfig, HeadlessHost, HttpNetwork, WorkerContext};

    /// A context whose network points at `origin`.
    pub(crate) async fn context(origin: &str) -> Arc<WorkerContext> {
        let config = AppConfig { origin: origin.into(), preload_urls: vec![], ..Default::default() };
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = HttpNetwork::new(FetchConfig::from_app_config(&config).unwrap()).unwrap();
        Arc::new(WorkerContext::new(config, db, Arc::new(network), Arc::new(HeadlessHost::new())).unwrap())
    }

    /// Decode the JSON text content of a tool result.
    pub(crate) fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
