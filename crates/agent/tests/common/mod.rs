//! Shared fixtures for agent integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use sortie_agent::tools::{BashTool, EditTool, InspectPortTool, SmartReadTool, ToolDescriptor};
use sortie_agent::{
    CommandRunner, DecisionSource, LoopSettings, MissionContext, MissionLoop, ToolRegistry,
    VerificationGate,
};
use sortie_state::{SharedManifest, StateManifest, ThoughtEngine};

/// Temp working directory with a manifest and runner rooted in it
pub struct Fixture {
    pub dir: TempDir,
    pub manifest: SharedManifest,
    pub runner: Arc<CommandRunner>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let manifest = StateManifest::new(dir.path().join("agent_state.json")).into_shared();
        let runner = Arc::new(
            CommandRunner::new(manifest.clone(), dir.path()).with_timeout(Duration::from_secs(10)),
        );
        Self {
            dir,
            manifest,
            runner,
        }
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn manifest_path(&self) -> std::path::PathBuf {
        self.dir.path().join("agent_state.json")
    }

    pub fn log_path(&self) -> std::path::PathBuf {
        self.dir.path().join("alpha.log")
    }

    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(BashTool::new(self.runner.clone(), 10_000));
        registry.register(EditTool::new(self.dir.path().to_path_buf()));
        registry.register(SmartReadTool::new(self.dir.path().to_path_buf()));
        registry.register(InspectPortTool::new());
        registry
    }

    pub fn mission_loop(
        &self,
        decision: ScriptedDecision,
        max_iterations: u32,
    ) -> MissionLoop<ScriptedDecision> {
        MissionLoop::new(
            decision,
            self.registry(),
            VerificationGate::new(self.runner.clone()),
            self.manifest.clone(),
            ThoughtEngine::new(self.log_path()),
        )
        .with_settings(LoopSettings {
            max_iterations,
            max_decision_failures: 3,
        })
    }
}

/// Decision source that replays canned replies.
///
/// Once the script runs out the last reply repeats.
#[derive(Clone)]
pub struct ScriptedDecision {
    replies: Arc<Mutex<VecDeque<String>>>,
    last: Arc<Mutex<Option<String>>>,
    /// Context seen by each proposal: (mission, last observation)
    pub seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedDecision {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            last: Arc::new(Mutex::new(None)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn observations(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, obs)| obs.clone())
            .collect()
    }

    pub fn missions(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(mission, _)| mission.clone())
            .collect()
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecision {
    async fn propose(
        &self,
        context: &MissionContext,
        _state_snapshot: &str,
        _tools: &[ToolDescriptor],
    ) -> sortie_agent::Result<String> {
        self.seen
            .lock()
            .unwrap()
            .push((context.mission.clone(), context.last_observation.clone()));

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Ok(reply)
            }
            None => Ok(last.clone().unwrap_or_default()),
        }
    }
}

/// JSON step as a decision source would write it
pub fn step(tool: &str, input: serde_json::Value, verification: Option<&str>) -> String {
    serde_json::json!({
        "thought": format!("use {}", tool),
        "expectation": "it works",
        "tool": tool,
        "input": input,
        "verification": verification.unwrap_or(""),
    })
    .to_string()
}
