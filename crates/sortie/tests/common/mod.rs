//! Common test utilities for sortie integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated HOME with a scratch working directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".sortie");
        let workspace_dir = temp_dir.path().join("workspace");

        std::fs::create_dir_all(&workspace_dir)?;

        Ok(Self {
            temp_dir,
            data_dir,
            workspace_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn workspace_file(&self, name: &str) -> PathBuf {
        self.workspace_dir.join(name)
    }

    /// Command with HOME pointed at the test environment and no provider keys
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sortie"));
        cmd.env("HOME", self.temp_dir.path())
            .env_remove("GEMINI_API_KEY")
            .env_remove("OPENAI_API_KEY")
            .env_remove("OPENROUTER_API_KEY")
            .env_remove("RUST_LOG")
            .current_dir(&self.workspace_dir);
        cmd
    }

    /// Write a manifest with one verified path
    pub fn create_manifest(&self) -> anyhow::Result<PathBuf> {
        let path = self.workspace_file("agent_state.json");
        let manifest = r#"{
  "verified_paths": { "app.py": "src/app.py" },
  "env_vars": { "PORT": "8080" },
  "checkpoints": ["verified at iteration 2: test -f src/app.py"]
}"#;
        std::fs::write(&path, manifest)?;
        Ok(path)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
