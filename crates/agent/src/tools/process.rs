//! KillProcess: terminate a PID, escalating to a forced kill

use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::{int_arg, ToolResult, ToolTrait};

pub struct KillProcessTool {
    grace: Duration,
}

impl KillProcessTool {
    pub fn new() -> Self {
        Self {
            grace: Duration::from_secs(1),
        }
    }

    /// How long to wait after SIGTERM before checking again
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

impl Default for KillProcessTool {
    fn default() -> Self {
        Self::new()
    }
}

struct Outcome {
    success: bool,
    stderr: String,
}

async fn run(program: &str, args: &[&str]) -> Outcome {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;
    match output {
        Ok(out) => Outcome {
            success: out.status.success(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        },
        Err(e) => Outcome {
            success: false,
            stderr: e.to_string(),
        },
    }
}

/// State letter from `/proc/<pid>/stat`, when procfs is available
async fn proc_state(pid: u32) -> Option<Option<char>> {
    if !std::path::Path::new("/proc/self/stat").exists() {
        return None;
    }
    let stat = tokio::fs::read_to_string(format!("/proc/{}/stat", pid)).await.ok();
    // the command name may contain spaces or parens; the state follows the last ')'
    Some(stat.and_then(|s| s.rsplit_once(')').and_then(|(_, rest)| rest.trim().chars().next())))
}

/// Whether `pid` names a live (non-zombie) process
pub async fn is_alive(pid: u32) -> bool {
    if let Some(state) = proc_state(pid).await {
        return matches!(state, Some(c) if c != 'Z' && c != 'X');
    }

    let pid_arg = pid.to_string();
    let output = Command::new("ps")
        .args(["-o", "stat=", "-p", pid_arg.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() => {
            let stat = String::from_utf8_lossy(&out.stdout);
            let stat = stat.trim();
            !stat.is_empty() && !stat.starts_with('Z')
        }
        _ => false,
    }
}

#[async_trait]
impl ToolTrait for KillProcessTool {
    fn name(&self) -> &str {
        "KillProcess"
    }
    fn description(&self) -> &str {
        "Terminate a process by PID. Sends a normal kill first and forces it with sudo if the process survives."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pid": { "type": "integer", "description": "Process ID" }
            },
            "required": ["pid"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let pid = int_arg(&args, "pid")
            .and_then(|p| u32::try_from(p).ok())
            .filter(|p| *p > 1)
            .ok_or("parameter 'pid' must be a positive process ID")?;

        if !is_alive(pid).await {
            return Ok(format!(
                "STATUS: FAILED_TO_KILL. Stderr: no process with PID {}",
                pid
            ));
        }

        let pid_arg = pid.to_string();
        let term = run("kill", &[pid_arg.as_str()]).await;
        tokio::time::sleep(self.grace).await;
        if !is_alive(pid).await {
            info!("◆ KILLED {}", pid);
            return Ok("STATUS: KILLED (Standard)".to_string());
        }

        warn!("pid {} survived kill, forcing", pid);
        let force = run("sudo", &["-n", "kill", "-9", pid_arg.as_str()]).await;
        tokio::time::sleep(self.grace.min(Duration::from_millis(200))).await;
        if force.success && !is_alive(pid).await {
            return Ok("STATUS: KILLED (Sudo Force)".to_string());
        }

        let stderr = [term.stderr, force.stderr]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        Ok(format!("STATUS: FAILED_TO_KILL. Stderr: {}", stderr))
    }
}
