//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker context.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::{SwFetchParams, config_impl, fetch_impl, status_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_worker::WorkerContext;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    ctx: Arc<WorkerContext>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler over an installed worker.
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx, tool_router: Self::tool_router() }
    }

    /// Fetch a URL through the worker.
    #[tool(
        description = "Fetch a URL through the caching worker. The configured rules pick a strategy (cache-first, network-first, stale-while-revalidate, network-only, cache-only); excluded and unmatched URLs go to the network uncached."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Report worker version, environment, cache name, expiration and cleanup interval.")]
    async fn sw_config(&self) -> Result<CallToolResult, McpError> {
        config_impl(&self.ctx).await
    }

    #[tool(description = "Report install time, last and next cache cleanup, and whether a cleanup is pending.")]
    async fn sw_cleanup_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.ctx).await
    }

    /// Retrieve a cached response by URL.
    #[tool(description = "Retrieve the cached response for a URL from the current cache namespace.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.ctx, params.0).await
    }

    /// Purge cached responses.
    #[tool(description = "Delete the cached response for a URL, or every entry in the current namespace with all=true.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.ctx, params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
