//! Self-correcting shell execution
//!
//! Commands are rewritten with facts from the manifest before they run. A
//! failure that looks like a missing path triggers discovery and exactly one
//! retry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use sortie_config::RunnerConfig;
use sortie_state::{SharedManifest, StateManifest};

use crate::discovery::DiscoveryResolver;

/// stderr fragments that mean "the path you gave me is not there"
pub const MISSING_PATH_SIGNATURES: &[&str] = &[
    "No such file or directory",
    "cannot stat",
    "cannot access",
    "can't open file",
    "cannot open",
    "does not exist",
    "FileNotFoundError",
    "cannot find the path",
];

/// Whether stderr carries a missing-path signature
pub fn is_missing_path(stderr: &str) -> bool {
    MISSING_PATH_SIGNATURES.iter().any(|sig| stderr.contains(sig))
}

/// Result of one shell invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The command text as actually executed, after rewriting
    pub command: String,
    /// -1 when the process was killed by a signal or timed out
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Set when this output comes from the post-discovery retry
    pub retried: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Observation text handed back to the decision source
    pub fn to_observation(&self, max_bytes: usize) -> String {
        format!(
            "EXIT_CODE: {}\nSTDOUT:\n{}\nSTDERR:\n{}",
            self.exit_code,
            truncate(&self.stdout, max_bytes),
            truncate(&self.stderr, max_bytes)
        )
    }
}

/// Cut `text` to at most `max_bytes` on a char boundary, noting the remainder
pub fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n[OUTPUT TRUNCATED: {} BYTES REMAINING]",
        &text[..end],
        text.len() - end
    )
}

/// Short single-line preview for console tracing
pub(crate) fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 300 {
        format!("{}...", trimmed.chars().take(300).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '~')
}

/// True when `prefix` ends at a token boundary, either directly or
/// through a bare `./` that is itself standalone.
fn starts_token(prefix: &str) -> bool {
    let prefix = match prefix.strip_suffix("./") {
        Some(rest) if !rest.chars().next_back().is_some_and(is_path_char) => return true,
        Some(_) => return false,
        None => prefix,
    };
    !prefix.chars().next_back().is_some_and(is_path_char)
}

/// Replace standalone occurrences of `name` in `command` with `replacement`.
///
/// An occurrence counts only when it is not glued to other path characters,
/// so `a.py` is left alone inside `data.py` or `src/a.py`. A leading `./`
/// names the working directory and is kept: `./a.py` becomes `./lib/a.py`.
pub fn replace_token(command: &str, name: &str, replacement: &str) -> String {
    if name.is_empty() {
        return command.to_string();
    }
    let mut out = String::with_capacity(command.len());
    let mut last = 0;
    for (idx, _) in command.match_indices(name) {
        if idx < last {
            continue;
        }
        let after = command[idx + name.len()..].chars().next();
        let standalone = starts_token(&command[..idx]) && !after.is_some_and(is_path_char);
        if standalone {
            out.push_str(&command[last..idx]);
            out.push_str(replacement);
            last = idx + name.len();
        }
    }
    out.push_str(&command[last..]);
    out
}

/// Substitute every known `filename -> path` fact into `command`.
///
/// A fact is skipped when its resolved path already appears in the command.
pub fn rewrite_command(command: &str, manifest: &StateManifest) -> String {
    let mut rewritten = command.to_string();
    for (filename, full_path) in manifest.verified_paths() {
        if rewritten.contains(filename.as_str()) && !rewritten.contains(full_path.as_str()) {
            rewritten = replace_token(&rewritten, filename, full_path);
        }
    }
    rewritten
}

/// Shell runner with manifest-driven rewriting and discovery
pub struct CommandRunner {
    manifest: SharedManifest,
    discovery: DiscoveryResolver,
    shell: String,
    timeout: Duration,
    working_dir: PathBuf,
}

impl CommandRunner {
    pub fn new(manifest: SharedManifest, working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        Self {
            discovery: DiscoveryResolver::new(manifest.clone(), &working_dir),
            manifest,
            shell: "sh".to_string(),
            timeout: Duration::from_secs(120),
            working_dir,
        }
    }

    pub fn from_config(
        manifest: SharedManifest,
        working_dir: impl AsRef<Path>,
        config: &RunnerConfig,
    ) -> Self {
        Self::new(manifest, working_dir)
            .with_shell(config.shell.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn manifest(&self) -> &SharedManifest {
        &self.manifest
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn prepare(&self, command: &str) -> (String, BTreeMap<String, String>) {
        let manifest = self.manifest.lock().await;
        let rewritten = rewrite_command(command, &manifest);
        (rewritten, manifest.env_vars().clone())
    }

    /// Rewrite and execute once; no discovery.
    pub async fn run_once(&self, command: &str) -> crate::Result<CommandOutput> {
        let (rewritten, env) = self.prepare(command).await;
        if rewritten != command {
            debug!("rewrote command: {} -> {}", command, rewritten);
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&rewritten)
            .current_dir(&self.working_dir)
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("command timed out after {:?}: {}", self.timeout, rewritten);
                return Ok(CommandOutput {
                    command: rewritten,
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("TIMEOUT AFTER {} SECONDS", self.timeout.as_secs()),
                    timed_out: true,
                    retried: false,
                });
            }
        };

        Ok(CommandOutput {
            command: rewritten,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out: false,
            retried: false,
        })
    }

    /// Execute with self-correction: a missing-path failure runs discovery
    /// and re-issues the command once. The retry's result is final.
    pub async fn run(&self, command: &str) -> crate::Result<CommandOutput> {
        info!("◆ Bash: {}", command);
        let first = self.run_once(command).await?;
        if first.success() || first.timed_out || !is_missing_path(&first.stderr) {
            log_output(&first);
            return Ok(first);
        }

        warn!("path mismatch detected, entering discovery");
        if let Err(e) = self.discovery.resolve(&first.command).await {
            warn!("discovery failed: {}", e);
        }

        let mut retry = self.run_once(command).await?;
        retry.retried = true;
        if !retry.success() {
            warn!("retry after discovery still failed (exit {})", retry.exit_code);
        }
        log_output(&retry);
        Ok(retry)
    }
}

fn log_output(output: &CommandOutput) {
    info!("◆ STDOUT ({}): {}", output.exit_code, preview(&output.stdout));
    if !output.stderr.trim().is_empty() {
        info!("◆ STDERR: {}", preview(&output.stderr));
    }
}
