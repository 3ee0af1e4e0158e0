//! InspectPort: who is listening on a TCP port

use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{int_arg, ToolResult, ToolTrait};

pub struct InspectPortTool;

impl InspectPortTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InspectPortTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `script` under `sh -c` and return trimmed stdout; failures yield ""
async fn sh_stdout(script: &str) -> String {
    let output = Command::new("sh")
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;
    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        Err(e) => {
            debug!("{} failed to start: {}", script, e);
            String::new()
        }
    }
}

/// First PID in whitespace-separated tool output
pub fn first_pid(output: &str) -> Option<u32> {
    output.split_whitespace().find_map(|t| t.parse().ok())
}

/// PID listening on `port`, via `lsof` and then `ss`
pub async fn find_listener(port: u16) -> Option<u32> {
    let lsof = sh_stdout(&format!("lsof -i :{} -t 2>/dev/null", port)).await;
    if let Some(pid) = first_pid(&lsof) {
        return Some(pid);
    }
    let ss = sh_stdout(&format!(
        "ss -lptn 'sport = :{}' 2>/dev/null | grep -o 'pid=[0-9]*' | cut -d= -f2",
        port
    ))
    .await;
    first_pid(&ss)
}

/// Whether binding `port` fails because something already holds it.
///
/// Used when neither `lsof` nor `ss` can name the owner.
pub async fn port_in_use(port: u16) -> bool {
    match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(_) => false,
        Err(e) => {
            debug!("bind probe on port {} failed: {}", port, e);
            e.kind() == std::io::ErrorKind::AddrInUse
        }
    }
}

#[async_trait]
impl ToolTrait for InspectPortTool {
    fn name(&self) -> &str {
        "InspectPort"
    }
    fn description(&self) -> &str {
        "Check whether a TCP port is in use and, if so, which process holds it."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "port": { "type": "integer", "description": "Port number (1-65535)" }
            },
            "required": ["port"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let port = int_arg(&args, "port")
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p > 0)
            .ok_or("parameter 'port' must be an integer between 1 and 65535")?;

        let Some(pid) = find_listener(port).await else {
            if port_in_use(port).await {
                return Ok("PORT_STATUS: OCCUPIED\nPID: unknown\nDETAILS:\n\
                           port is bound but no owning process could be identified"
                    .to_string());
            }
            return Ok("PORT_STATUS: FREE".to_string());
        };

        let details = sh_stdout(&format!("ps -fp {}", pid)).await;
        Ok(format!(
            "PORT_STATUS: OCCUPIED\nPID: {}\nDETAILS:\n{}",
            pid, details
        ))
    }
}
