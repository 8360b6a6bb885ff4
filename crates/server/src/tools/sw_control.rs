//! sw_config and sw_cleanup_status tool implementations.
//!
//! Both answer through the worker's control channel, the same path a page
//! uses with `GET_SW_CONFIG` and `GET_SW_CLEANUP_STATUS`.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_worker::{CleanupStatusReply, WorkerContext};

use super::json_result;

/// Output structure for the sw_cleanup_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwCleanupStatusOutput {
    /// Whether the expiry scheduler is enabled.
    pub enabled: bool,
    /// Cleanup timestamps; absent while cleanup is disabled.
    #[schemars(with = "Option<serde_json::Value>")]
    pub status: Option<CleanupStatusReply>,
}

/// Implementation of the sw_config tool.
pub async fn config_impl(ctx: &WorkerContext) -> Result<CallToolResult, McpError> {
    json_result(&ctx.control().sw_config())
}

/// Implementation of the sw_cleanup_status tool.
pub async fn status_impl(ctx: &WorkerContext) -> Result<CallToolResult, McpError> {
    let status = ctx.control().cleanup_status(Utc::now()).await;
    let output = SwCleanupStatusOutput { enabled: ctx.scheduler().is_enabled(), status };
    json_result(&output)
}
