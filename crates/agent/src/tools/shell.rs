//! Bash: shell commands through the self-correcting runner

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{ToolResult, ToolTrait};
use crate::runner::CommandRunner;

pub struct BashTool {
    runner: Arc<CommandRunner>,
    max_output_bytes: usize,
}

impl BashTool {
    pub fn new(runner: Arc<CommandRunner>, max_output_bytes: usize) -> Self {
        Self {
            runner,
            max_output_bytes,
        }
    }
}

#[derive(Deserialize)]
struct BashArgs {
    command: String,
}

#[async_trait]
impl ToolTrait for BashTool {
    fn name(&self) -> &str {
        "Bash"
    }
    fn description(&self) -> &str {
        "Run a shell command. Paths that fail with 'No such file' are searched for and the command is retried once with the resolved path."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to run" }
            },
            "required": ["command"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: BashArgs = serde_json::from_value(args)?;
        match self.runner.run(&args.command).await {
            Ok(output) => Ok(output.to_observation(self.max_output_bytes)),
            Err(e) => Ok(format!("EXECUTION_ERROR: {}", e)),
        }
    }
}
