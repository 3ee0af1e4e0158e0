//! Discovery mode: find where a misreferenced file actually lives

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use sortie_state::SharedManifest;

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-zA-Z0-9_\-]+\.[a-zA-Z0-9]+").unwrap())
}

/// Filename-shaped tokens (`name.ext`) in `command`, first occurrence order
pub fn candidate_filenames(command: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in filename_pattern().find_iter(command) {
        let name = m.as_str().to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Search `root` recursively for a file named `filename`.
///
/// Entries are visited in name order so repeated runs over the same tree
/// agree. Unreadable directories are skipped.
pub fn find_file(root: &Path, filename: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == filename)
        .map(|entry| entry.into_path())
}

/// Resolves bare filenames from a failed command into manifest facts
#[derive(Clone)]
pub struct DiscoveryResolver {
    manifest: SharedManifest,
    root: PathBuf,
}

impl DiscoveryResolver {
    pub fn new(manifest: SharedManifest, root: impl AsRef<Path>) -> Self {
        Self {
            manifest,
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan `command` for filenames and record the first on-disk match of
    /// each one that is not already reachable from the root as written.
    ///
    /// Returns the number of facts recorded.
    pub async fn resolve(&self, command: &str) -> crate::Result<usize> {
        let candidates: Vec<String> = candidate_filenames(command)
            .into_iter()
            .filter(|name| !self.root.join(name).exists())
            .collect();
        if candidates.is_empty() {
            debug!("no unresolved filenames in: {}", command);
            return Ok(0);
        }

        let root = self.root.clone();
        let found = tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .filter_map(|name| {
                    let hit = find_file(&root, &name)?;
                    let relative = hit.strip_prefix(&root).unwrap_or(&hit).to_path_buf();
                    Some((name, relative.to_string_lossy().to_string()))
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| crate::AgentError::ToolExecution(format!("discovery task failed: {}", e)))?;

        let mut manifest = self.manifest.lock().await;
        for (name, path) in &found {
            info!("◆ DISCOVERY: {} -> {}", name, path);
            manifest.update_fact(name.clone(), path.clone()).await?;
        }
        Ok(found.len())
    }
}
