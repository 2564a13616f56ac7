//! MCP server handler for the agent host.
//!
//! Routes tool calls to the worker.

use std::sync::Arc;

use crate::tools::{AgentFetchParams, CacheMatchParams, fetch_impl, keys_impl, match_impl, start_impl};
use crate::worker::Worker;

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

/// The MCP server handler for mikra-agent.
#[derive(Clone)]
pub struct AgentServer {
    worker: Arc<Worker>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AgentServer {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    /// Deliver a fetch event to the worker.
    #[tool(
        description = "Fetch a URL through the offline agent. Returns status, headers, body, the response source (network, cache, fallback) and the caching strategy applied."
    )]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Run install then activate. Retries a failed install or re-seeds the current cache partition.")]
    async fn agent_start(&self) -> Result<CallToolResult, McpError> {
        start_impl(&self.worker).await
    }

    #[tool(description = "List cache partition names in creation order.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.worker).await
    }

    /// Look up a URL in the cache store without touching the network.
    #[tool(description = "Look up a cached GET response by URL, optionally within one partition. Never hits the network.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        match_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for AgentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mikra-agent".into(),
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
