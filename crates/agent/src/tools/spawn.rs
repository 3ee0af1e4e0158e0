//! SpawnSubAgent and PollSubAgent

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::{bool_arg, ToolResult, ToolTrait};
use crate::subagent::SubagentManager;

/// Starts a sub-mission in a separate agent process
pub struct SpawnSubAgentTool {
    manager: Arc<SubagentManager>,
}

impl SpawnSubAgentTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ToolTrait for SpawnSubAgentTool {
    fn name(&self) -> &str {
        "SpawnSubAgent"
    }
    fn description(&self) -> &str {
        "Delegate a sub-mission to a separate agent. Blocking waits for its report; non-blocking returns a HANDLE for PollSubAgent."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "mission": { "type": "string", "description": "Self-contained sub-mission" },
                "blocking": { "type": "boolean", "description": "Wait for completion", "default": true }
            },
            "required": ["mission"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let mission = args["mission"]
            .as_str()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or("missing required parameter 'mission'")?;
        let blocking = bool_arg(&args, "blocking").unwrap_or(true);
        Ok(self.manager.spawn(mission, blocking).await?)
    }
}

/// Reports on a non-blocking sub-mission
pub struct PollSubAgentTool {
    manager: Arc<SubagentManager>,
}

impl PollSubAgentTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ToolTrait for PollSubAgentTool {
    fn name(&self) -> &str {
        "PollSubAgent"
    }
    fn description(&self) -> &str {
        "Check a non-blocking sub-agent: RUNNING or FINISHED, plus its output so far."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "handle": { "type": "string", "description": "HANDLE returned by SpawnSubAgent" }
            },
            "required": ["handle"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let handle = args["handle"]
            .as_str()
            .map(str::trim)
            .ok_or("missing required parameter 'handle'")?;
        Ok(self.manager.poll(handle).await?)
    }
}
