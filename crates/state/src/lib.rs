//! Durable mission state: the fact store and the thought log.
//!
//! [`StateManifest`] remembers file paths that discovery has resolved and
//! environment overrides for subshells. Every mutation is written through
//! to disk immediately. [`ThoughtEngine`] keeps the append-only record of
//! what the loop expected before each action.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod thought;

pub use thought::{ThoughtEngine, ThoughtRecord};

/// State persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Manifest handle shared by the runner, discovery and the loop
pub type SharedManifest = Arc<Mutex<StateManifest>>;

/// On-disk shape of the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestData {
    /// Bare filename -> path where discovery found it
    #[serde(default)]
    pub verified_paths: BTreeMap<String, String>,
    /// Variables exported into every subshell
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

/// Persistent fact store, written through on every mutation.
///
/// Single-writer: two processes pointing at the same file will clobber
/// each other's facts.
#[derive(Debug, Clone)]
pub struct StateManifest {
    path: PathBuf,
    data: ManifestData,
}

impl StateManifest {
    /// Empty manifest bound to `path`; nothing is read or written.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            data: ManifestData::default(),
        }
    }

    /// Load the manifest at `path`.
    ///
    /// A missing file gives an empty manifest. A file that cannot be read
    /// or decoded is also replaced by an empty manifest: the facts can be
    /// rebuilt by running discovery again.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("no manifest at {:?}, starting empty", path);
            return Self::new(path);
        }

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<ManifestData>(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!("discarding unreadable manifest {:?}: {}", path, e);
                    ManifestData::default()
                }
            },
            Err(e) => {
                warn!("failed to read manifest {:?}: {}", path, e);
                ManifestData::default()
            }
        };

        info!(
            "loaded manifest {:?} ({} verified paths)",
            path,
            data.verified_paths.len()
        );
        Self { path, data }
    }

    /// Wrap into the shared handle used across the agent
    pub fn into_shared(self) -> SharedManifest {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &ManifestData {
        &self.data
    }

    pub fn verified_paths(&self) -> &BTreeMap<String, String> {
        &self.data.verified_paths
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.data.env_vars
    }

    pub fn checkpoints(&self) -> &[String] {
        &self.data.checkpoints
    }

    /// Record where `filename` actually lives, then persist.
    pub async fn update_fact(
        &mut self,
        filename: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<()> {
        let filename = filename.into();
        let path = path.into();
        debug!("fact: {} -> {}", filename, path);
        self.data.verified_paths.insert(filename, path);
        self.save().await
    }

    /// Record an environment override for subshells, then persist.
    pub async fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.data.env_vars.insert(key.into(), value.into());
        self.save().await
    }

    /// Append a checkpoint label, then persist.
    pub async fn add_checkpoint(&mut self, label: impl Into<String>) -> Result<()> {
        self.data.checkpoints.push(label.into());
        self.save().await
    }

    /// Overwrite the file with the full manifest.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        tokio::fs::write(&self.path, content).await?;
        debug!("saved manifest {:?}", self.path);
        Ok(())
    }

    /// Compact JSON of the current facts, for prompts
    pub fn snapshot(&self) -> String {
        serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_data_serializes_all_sections() {
        let data = ManifestData::default();
        let json = serde_json::to_value(&data).unwrap();
        assert!(json["verified_paths"].as_object().unwrap().is_empty());
        assert!(json["env_vars"].as_object().unwrap().is_empty());
        assert!(json["checkpoints"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_manifest_data_tolerates_missing_sections() {
        let data: ManifestData =
            serde_json::from_str(r#"{"verified_paths": {"a.py": "src/a.py"}}"#).unwrap();
        assert_eq!(data.verified_paths["a.py"], "src/a.py");
        assert!(data.env_vars.is_empty());
        assert!(data.checkpoints.is_empty());
    }

    #[test]
    fn test_snapshot_is_compact_json() {
        let mut manifest = StateManifest::new("unused.json");
        manifest
            .data
            .verified_paths
            .insert("x.txt".to_string(), "d/x.txt".to_string());
        let snapshot = manifest.snapshot();
        assert!(!snapshot.contains('\n'));
        assert!(snapshot.contains("\"x.txt\":\"d/x.txt\""));
    }
}
