//! Tool surface offered to the decision source

pub mod filesystem;
pub mod port;
pub mod process;
pub mod shell;
pub mod spawn;

pub use filesystem::{EditTool, SmartReadTool};
pub use port::InspectPortTool;
pub use process::KillProcessTool;
pub use shell::BashTool;
pub use spawn::{PollSubAgentTool, SpawnSubAgentTool};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::runner::CommandRunner;
use crate::subagent::SubagentManager;

type BoxedTool = Box<dyn ToolTrait + Send + Sync>;

pub type ToolResult = Result<String, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> ToolResult;
}

/// What the decision source is told about a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub fn describe(tool: &dyn ToolTrait) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters(),
    }
}

/// Coerce model-supplied input into an argument object.
///
/// A bare value is assigned to the first required parameter, so `"ls"` for
/// `Bash` becomes `{"command": "ls"}`. `null` becomes `{}`.
pub fn normalize_args(schema: &Value, input: Value) -> Value {
    match input {
        Value::Object(_) => input,
        Value::Null => Value::Object(Map::new()),
        other => {
            let first = schema["required"]
                .as_array()
                .and_then(|r| r.first())
                .and_then(|v| v.as_str());
            match first {
                Some(key) => {
                    let mut map = Map::new();
                    map.insert(key.to_string(), other);
                    Value::Object(map)
                }
                None => other,
            }
        }
    }
}

/// Integer argument that may arrive as a number or a numeric string
pub(crate) fn int_arg(args: &Value, key: &str) -> Option<i64> {
    match &args[key] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean argument that may arrive as a bool or "true"/"false"
pub(crate) fn bool_arg(args: &Value, key: &str) -> Option<bool> {
    match &args[key] {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().to_ascii_lowercase().parse().ok(),
        _ => None,
    }
}

/// Name-keyed tool registry
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&(dyn ToolTrait + Send + Sync)> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors sorted by name, so prompts are stable
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| describe(t.as_ref())).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("Tool '{}' not found.", name))?;
        tool.execute(normalize_args(&tool.parameters(), args)).await
    }

    /// Run a tool and render any failure as an observation.
    pub async fn dispatch(&self, name: &str, args: Value) -> String {
        if !self.has(name) {
            warn!("unknown tool requested: {}", name);
            return format!("Error: Tool '{}' not found.", name);
        }
        info!("◆ TOOL {}", name);
        match self.execute(name, args).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("tool {} failed: {}", name, e);
                format!("Error: {}", e)
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the standard mission toolkit
pub fn register_default_tools(
    registry: &mut ToolRegistry,
    runner: Arc<CommandRunner>,
    subagents: Arc<SubagentManager>,
    max_output_bytes: usize,
) {
    let workspace = runner.working_dir().to_path_buf();

    registry.register(BashTool::new(runner, max_output_bytes));
    registry.register(EditTool::new(workspace.clone()));
    registry.register(SmartReadTool::new(workspace));
    registry.register(InspectPortTool::new());
    registry.register(KillProcessTool::new());
    registry.register(SpawnSubAgentTool::new(subagents.clone()));
    registry.register(PollSubAgentTool::new(subagents));
}
