//! Sub-missions run as separate agent processes

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use sortie_config::Config;

use crate::runner::truncate;
use crate::{AgentError, Result};

/// How a child agent process is started
#[derive(Debug, Clone)]
pub struct SubagentLauncher {
    program: PathBuf,
    base_args: Vec<String>,
    inherited_args: Vec<String>,
    dir: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl SubagentLauncher {
    pub fn new(program: impl Into<PathBuf>, dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            inherited_args: Vec::new(),
            dir: dir.as_ref().to_path_buf(),
            working_dir: PathBuf::from("."),
            timeout: Duration::from_secs(300),
        }
    }

    /// Launch copies of the running binary with its `run` subcommand
    pub fn current_exe(dir: impl AsRef<Path>) -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, dir).with_args(["run"]))
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Options passed to every child ahead of its state and log paths
    pub fn with_inherited_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherited_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Output file for a non-blocking sub-mission
    pub fn log_path(&self, handle: &str) -> PathBuf {
        self.dir.join(format!("{}.log", handle))
    }

    /// Per-handle directory holding the child's manifest and thought log
    pub fn state_dir(&self, handle: &str) -> PathBuf {
        self.dir.join(handle)
    }

    async fn command(&self, handle: &str, mission: &str) -> Result<Command> {
        let state_dir = self.state_dir(handle);
        tokio::fs::create_dir_all(&state_dir).await?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(&self.inherited_args)
            .arg("--state")
            .arg(state_dir.join("agent_state.json"))
            .arg("--log")
            .arg(state_dir.join("alpha.log"))
            .arg("--")
            .arg(mission)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null());
        Ok(cmd)
    }
}

/// Flags that reproduce the parent's agent settings in a child run
pub fn inherited_args(config: &Config, config_path: Option<&Path>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.to_string_lossy().to_string());
    }
    args.push("--provider".to_string());
    args.push(config.agent.provider.as_str().to_string());
    args.push("--model".to_string());
    args.push(config.agent.model.clone());
    args.push("--max-iterations".to_string());
    args.push(config.agent.max_iterations.to_string());
    if let Some(persona) = config.persona_path() {
        args.push("--persona".to_string());
        args.push(persona.to_string_lossy().to_string());
    }
    args
}

/// Tracks spawned sub-missions by handle
pub struct SubagentManager {
    launcher: SubagentLauncher,
    running: Mutex<HashMap<String, Child>>,
    /// Exit codes of detached children already reaped
    finished: Mutex<HashMap<String, i32>>,
    max_output_bytes: usize,
}

impl SubagentManager {
    pub fn new(launcher: SubagentLauncher) -> Self {
        Self {
            launcher,
            running: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashMap::new()),
            max_output_bytes: 10_000,
        }
    }

    /// Launcher for the current binary, placed per the config. Children
    /// load `config_path` and get the effective agent settings as flags.
    pub fn from_config(
        config: &Config,
        config_path: Option<&Path>,
        working_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let launcher = SubagentLauncher::current_exe(config.subagent_dir())?
            .with_inherited_args(inherited_args(config, config_path))
            .with_working_dir(working_dir)
            .with_timeout(Duration::from_secs(config.subagent.timeout_secs));
        Ok(Self::new(launcher).with_max_output(config.runner.max_output_bytes))
    }

    pub fn with_max_output(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    pub fn launcher(&self) -> &SubagentLauncher {
        &self.launcher
    }

    /// Start a sub-mission. Blocking waits for it (bounded by the launcher
    /// timeout) and returns its output; non-blocking returns a handle.
    pub async fn spawn(&self, mission: &str, blocking: bool) -> Result<String> {
        let handle = Uuid::new_v4().to_string();
        info!(
            "◆ SUB-AGENT {} ({}): {}",
            handle,
            if blocking { "blocking" } else { "detached" },
            mission
        );
        if blocking {
            self.run_blocking(&handle, mission).await
        } else {
            self.run_detached(&handle, mission).await
        }
    }

    async fn run_blocking(&self, handle: &str, mission: &str) -> Result<String> {
        let mut cmd = self.launcher.command(handle, mission).await?;
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.launcher.timeout;
        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(output) => {
                let output = output?;
                Ok(format!(
                    "Sub-Agent completed (exit {}). STDOUT:\n{}\nSTDERR:\n{}",
                    output.status.code().unwrap_or(-1),
                    truncate(&String::from_utf8_lossy(&output.stdout), self.max_output_bytes),
                    truncate(&String::from_utf8_lossy(&output.stderr), self.max_output_bytes)
                ))
            }
            Err(_) => {
                warn!("sub-agent {} timed out", handle);
                Ok(format!(
                    "Sub-Agent timed out after {} seconds.",
                    timeout.as_secs()
                ))
            }
        }
    }

    async fn run_detached(&self, handle: &str, mission: &str) -> Result<String> {
        let mut cmd = self.launcher.command(handle, mission).await?;
        let log_path = self.launcher.log_path(handle);
        let log = tokio::fs::File::create(&log_path).await?.into_std().await;
        let log_err = log.try_clone()?;
        cmd.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));
        let child = cmd.spawn()?;

        self.running.lock().await.insert(handle.to_string(), child);
        Ok(format!(
            "Sub-Agent spawned (non-blocking). HANDLE: {}\nOUTPUT: {}",
            handle,
            log_path.display()
        ))
    }

    /// Status and captured output of a non-blocking sub-mission
    pub async fn poll(&self, handle: &str) -> Result<String> {
        let status = match self.reap(handle).await? {
            Some(code) => format!("FINISHED (exit {})", code),
            None => "RUNNING".to_string(),
        };

        let output = tokio::fs::read(self.launcher.log_path(handle))
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
            .unwrap_or_default();
        Ok(format!(
            "STATUS: {}\nOUTPUT:\n{}",
            status,
            tail(&output, self.max_output_bytes)
        ))
    }

    /// Exit code of `handle` once it has exited; an exited child leaves
    /// the running map.
    async fn reap(&self, handle: &str) -> Result<Option<i32>> {
        if let Some(code) = self.finished.lock().await.get(handle) {
            return Ok(Some(*code));
        }

        let mut running = self.running.lock().await;
        let child = running
            .get_mut(handle)
            .ok_or_else(|| AgentError::Subagent(format!("unknown handle '{}'", handle)))?;
        let Some(status) = child.try_wait()? else {
            return Ok(None);
        };

        let code = status.code().unwrap_or(-1);
        running.remove(handle);
        self.finished.lock().await.insert(handle.to_string(), code);
        Ok(Some(code))
    }

    /// Detached sub-missions still running; exited ones are reaped
    pub async fn running_count(&self) -> usize {
        let handles: Vec<String> = self.running.lock().await.keys().cloned().collect();
        let mut count = 0;
        for handle in handles {
            if matches!(self.reap(&handle).await, Ok(None)) {
                count += 1;
            }
        }
        count
    }
}

/// Last `max_bytes` of `text`, on a char boundary
fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
