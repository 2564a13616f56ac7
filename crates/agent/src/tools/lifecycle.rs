//! agent_start tool implementation.
//!
//! Runs install then activate. After a failed install this is the retry
//! path; on an active worker it re-seeds the partition and re-activates.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::worker::Worker;

/// Output structure for the agent_start tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentStartOutput {
    /// Worker state after the run.
    pub state: String,
    /// True once the worker controls its clients.
    pub controlling: bool,
    pub partition: String,
}

/// Implementation of the agent_start tool.
pub async fn start_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let state = worker.start().await?;
    let output = AgentStartOutput {
        state: state.to_string(),
        controlling: worker.is_controlling(),
        partition: worker.config().version_tag.clone(),
    };
    super::json_result(&output)
}
