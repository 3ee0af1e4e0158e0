//! Thought log: what the loop believed before each action

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::Result;

/// Marker every log line carries
pub const THOUGHT_MARKER: &str = "[THOUGHT]";

/// One hypothesis/expectation pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtRecord {
    pub timestamp: DateTime<Local>,
    pub hypothesis: String,
    pub expectation: String,
}

impl ThoughtRecord {
    /// Single log line; embedded newlines are flattened
    pub fn log_line(&self) -> String {
        format!(
            "{} {}: {} | Expectation: {}",
            self.timestamp.to_rfc3339(),
            THOUGHT_MARKER,
            one_line(&self.hypothesis),
            one_line(&self.expectation)
        )
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Append-only record of the loop's reasoning.
///
/// The log file is opened and closed on every call, so lines already
/// written survive a killed process.
#[derive(Debug)]
pub struct ThoughtEngine {
    log_path: PathBuf,
    history: Vec<ThoughtRecord>,
}

impl ThoughtEngine {
    pub fn new(log_path: impl AsRef<Path>) -> Self {
        Self {
            log_path: log_path.as_ref().to_path_buf(),
            history: Vec::new(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Every thought recorded by this engine, oldest first
    pub fn history(&self) -> &[ThoughtRecord] {
        &self.history
    }

    /// Timestamp a thought, keep it in memory and append it to the log.
    /// The record stays in history even when the log write fails.
    pub async fn record(
        &mut self,
        hypothesis: impl Into<String>,
        expectation: impl Into<String>,
    ) -> Result<&ThoughtRecord> {
        let record = ThoughtRecord {
            timestamp: Local::now(),
            hypothesis: hypothesis.into(),
            expectation: expectation.into(),
        };
        let line = record.log_line();
        info!("◆ {}", &line[line.find(THOUGHT_MARKER).unwrap_or(0)..]);

        self.history.push(record);
        self.append(&line).await?;
        Ok(&self.history[self.history.len() - 1])
    }

    async fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Last `n` thought lines of a log file; a missing file has none.
    pub async fn tail(log_path: impl AsRef<Path>, n: usize) -> Result<Vec<String>> {
        let path = log_path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let lines: Vec<String> = content
            .lines()
            .filter(|l| l.contains(THOUGHT_MARKER))
            .map(str::to_string)
            .collect();
        let skip = lines.len().saturating_sub(n);
        Ok(lines.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_format() {
        let record = ThoughtRecord {
            timestamp: Local::now(),
            hypothesis: "List files".to_string(),
            expectation: "See file names".to_string(),
        };
        let line = record.log_line();
        assert!(line.ends_with("[THOUGHT]: List files | Expectation: See file names"));
    }

    #[test]
    fn test_log_line_flattens_newlines() {
        let record = ThoughtRecord {
            timestamp: Local::now(),
            hypothesis: "first\nsecond".to_string(),
            expectation: "a\n\n b".to_string(),
        };
        let line = record.log_line();
        assert!(!line.contains('\n'));
        assert!(line.contains("first second"));
        assert!(line.contains("Expectation: a b"));
    }
}
