//! Edit and SmartRead: whole-file writes and bounded reads

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;

use sortie_config::resolve_path;

use super::{bool_arg, int_arg, ToolResult, ToolTrait};

pub const DEFAULT_READ_LINES: usize = 500;

/// Writes full file content, creating parent directories
pub struct EditTool {
    workspace: PathBuf,
}

impl EditTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct EditArgs {
    path: String,
    content: String,
}

#[async_trait]
impl ToolTrait for EditTool {
    fn name(&self) -> &str {
        "Edit"
    }
    fn description(&self) -> &str {
        "Write the full content of a file, replacing it if it exists. Parent directories are created."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to write" },
                "content": { "type": "string", "description": "Complete new file content" }
            },
            "required": ["path", "content"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: EditArgs = serde_json::from_value(args)?;
        let path = resolve_path(&args.path, &self.workspace);

        debug!("◆ EDIT {:?} ({} bytes)", path, args.content.len());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::write(&path, &args.content).await {
            Ok(_) => Ok(format!("Successfully wrote to {}", args.path)),
            Err(e) => Ok(format!("Error writing {}: {}", args.path, e)),
        }
    }
}

/// Reads the head or tail of a file
pub struct SmartReadTool {
    workspace: PathBuf,
}

impl SmartReadTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

/// First (or last) `lines` lines of `content`, line endings kept
pub fn slice_lines(content: &str, lines: usize, from_bottom: bool) -> String {
    let all: Vec<&str> = content.split_inclusive('\n').collect();
    let picked = if from_bottom {
        &all[all.len().saturating_sub(lines)..]
    } else {
        &all[..lines.min(all.len())]
    };
    picked.concat()
}

#[async_trait]
impl ToolTrait for SmartReadTool {
    fn name(&self) -> &str {
        "SmartRead"
    }
    fn description(&self) -> &str {
        "Read up to `lines` lines of a file, from the top or (with from_bottom) the end. Use from_bottom for logs."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to read" },
                "lines": { "type": "integer", "description": "Maximum lines to return", "default": DEFAULT_READ_LINES },
                "from_bottom": { "type": "boolean", "description": "Read the last lines instead of the first", "default": false }
            },
            "required": ["path"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let path_arg = args["path"]
            .as_str()
            .ok_or("missing required parameter 'path'")?
            .to_string();
        let lines = int_arg(&args, "lines")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_READ_LINES);
        let from_bottom = bool_arg(&args, "from_bottom").unwrap_or(false);

        let path = resolve_path(&path_arg, &self.workspace);
        debug!("◆ READ {:?} ({} lines, bottom={})", path, lines, from_bottom);
        if !path.is_file() {
            return Ok(format!("Error: File {} not found.", path_arg));
        }

        let bytes = tokio::fs::read(&path).await?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(slice_lines(&content, lines, from_bottom))
    }
}
