//! Mission context and prompt assembly

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use sortie_provider::Message;

use crate::tools::ToolDescriptor;

/// Persona used when no persona file is configured or it cannot be read
pub const FALLBACK_PERSONA: &str = "You are an expert autonomous engineer. Your goal is to complete the given mission using the available tools.";

/// Observation fed into the very first proposal
pub const INITIAL_OBSERVATION: &str = "Initial state.";

/// Per-mission working state, owned by one loop run
#[derive(Debug, Clone)]
pub struct MissionContext {
    pub mission: String,
    pub iteration: u32,
    pub last_observation: String,
    /// Consecutive proposals that could not be decoded
    pub decision_failures: u32,
    pub last_thought: Option<String>,
}

impl MissionContext {
    pub fn new(mission: impl Into<String>) -> Self {
        Self {
            mission: mission.into(),
            iteration: 0,
            last_observation: INITIAL_OBSERVATION.to_string(),
            decision_failures: 0,
            last_thought: None,
        }
    }
}

/// Builds the system prompt and per-cycle messages
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    persona: String,
    working_dir: Option<PathBuf>,
}

impl ContextBuilder {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            working_dir: None,
        }
    }

    /// Read the persona file, falling back to the built-in persona.
    pub async fn load(persona_path: Option<&Path>) -> Self {
        let persona = match persona_path {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(content) if !content.trim().is_empty() => {
                    debug!("loaded persona from {:?}", path);
                    content.trim().to_string()
                }
                Ok(_) => {
                    warn!("persona file {:?} is empty, using default persona", path);
                    FALLBACK_PERSONA.to_string()
                }
                Err(e) => {
                    warn!("persona file {:?} unavailable ({}), using default persona", path, e);
                    FALLBACK_PERSONA.to_string()
                }
            },
            None => FALLBACK_PERSONA.to_string(),
        };
        Self::new(persona)
    }

    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Persona, environment and the JSON reply protocol
    pub fn build_system_prompt(&self, tools: &[ToolDescriptor]) -> String {
        let mut parts = vec![self.persona.clone()];

        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
        let mut env = format!("## Environment\nCurrent time: {}", now);
        if let Some(dir) = &self.working_dir {
            env.push_str(&format!("\nWorking directory: {}", dir.display()));
        }
        parts.push(env);

        let mut listing = String::from("## Tools");
        for tool in tools {
            listing.push_str(&format!(
                "\n- {}: {}\n  parameters: {}",
                tool.name, tool.description, tool.parameters
            ));
        }
        parts.push(listing);

        parts.push(
            r#"## Protocol
Reply with exactly one JSON object and nothing else:
{"thought": "<what you believe and why>", "expectation": "<what the tool should produce>", "tool": "<tool name>", "input": {<tool parameters>}, "verification": "<shell command that exits 0 only when the whole mission is complete, or empty>"}

Think before every action. Only provide a verification command when you believe the mission is finished. The last observation tells you what your previous action produced."#
                .to_string(),
        );

        parts.join("\n\n")
    }

    /// Messages for one proposal
    pub fn build_messages(
        &self,
        context: &MissionContext,
        state_snapshot: &str,
        tools: &[ToolDescriptor],
    ) -> Vec<Message> {
        vec![
            Message::system(self.build_system_prompt(tools)),
            Message::user(format!(
                "Mission: {}\nState: {}\nLast Observation: {}",
                context.mission, state_snapshot, context.last_observation
            )),
        ]
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(FALLBACK_PERSONA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bash_descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "Bash".to_string(),
            description: "Run a shell command".to_string(),
            parameters: json!({"type": "object", "properties": {"command": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_new_context_starts_at_initial_state() {
        let ctx = MissionContext::new("ship it");
        assert_eq!(ctx.iteration, 0);
        assert_eq!(ctx.last_observation, INITIAL_OBSERVATION);
        assert!(ctx.last_thought.is_none());
    }

    #[test]
    fn test_system_prompt_lists_tools_and_protocol() {
        let builder = ContextBuilder::default().with_working_dir("/tmp/work");
        let prompt = builder.build_system_prompt(&[bash_descriptor()]);
        assert!(prompt.starts_with(FALLBACK_PERSONA));
        assert!(prompt.contains("- Bash: Run a shell command"));
        assert!(prompt.contains("\"verification\""));
        assert!(prompt.contains("/tmp/work"));
    }

    #[test]
    fn test_user_message_layout() {
        let builder = ContextBuilder::new("persona");
        let mut ctx = MissionContext::new("fix the build");
        ctx.last_observation = "EXIT_CODE: 1".to_string();

        let messages = builder.build_messages(&ctx, "{}", &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1].content,
            "Mission: fix the build\nState: {}\nLast Observation: EXIT_CODE: 1"
        );
    }

    #[tokio::test]
    async fn test_load_missing_persona_falls_back() {
        let builder = ContextBuilder::load(Some(Path::new("/nonexistent/persona.md"))).await;
        assert_eq!(builder.persona(), FALLBACK_PERSONA);
    }

    #[tokio::test]
    async fn test_load_persona_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona.md");
        tokio::fs::write(&path, "You are a careful SRE.\n").await.unwrap();

        let builder = ContextBuilder::load(Some(&path)).await;
        assert_eq!(builder.persona(), "You are a careful SRE.");
    }
}
