//! Decision and review collaborators

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use sortie_config::Config;
use sortie_provider::{ChatParams, Message, Provider};

use crate::context::{ContextBuilder, MissionContext};
use crate::tools::ToolDescriptor;

/// Persona for the supervisor's review call
pub const REVIEWER_PERSONA: &str = "You are a Quality Assurance lead. Compare the User's Mission with the Agent's Report. Respond ONLY with 'SUCCESS' if the goal is met, or a detailed list of 'REMAINING_TASKS' if not.";

/// Produces the raw text of the next step
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn propose(
        &self,
        context: &MissionContext,
        state_snapshot: &str,
        tools: &[ToolDescriptor],
    ) -> crate::Result<String>;
}

/// Sampling knobs shared by the provider-backed collaborators
#[derive(Debug, Clone)]
struct Sampling {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

/// Decision source backed by a chat provider
pub struct ProviderDecisionSource {
    provider: Arc<dyn Provider>,
    sampling: Sampling,
    context: ContextBuilder,
}

impl ProviderDecisionSource {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, context: ContextBuilder) -> Self {
        Self {
            provider,
            sampling: Sampling {
                model: model.into(),
                temperature: 0.1,
                max_tokens: 4096,
            },
            context,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &Config, context: ContextBuilder) -> Self {
        Self::new(provider, config.agent.model.clone(), context)
            .with_sampling(config.agent.temperature, config.agent.max_tokens)
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.sampling.temperature = temperature;
        self.sampling.max_tokens = max_tokens;
        self
    }

    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }
}

#[async_trait]
impl DecisionSource for ProviderDecisionSource {
    async fn propose(
        &self,
        context: &MissionContext,
        state_snapshot: &str,
        tools: &[ToolDescriptor],
    ) -> crate::Result<String> {
        let params = ChatParams {
            model: self.sampling.model.clone(),
            messages: self.context.build_messages(context, state_snapshot, tools),
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
            json_mode: true,
        };
        let response = self.provider.chat(params).await?;
        debug!("proposal: {}", response.text_or_empty());
        Ok(response.text_or_empty().to_string())
    }
}

/// Reviewer verdict on a finished mission report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Success,
    /// Remaining work, as written by the reviewer
    Remaining(String),
}

impl Review {
    /// `SUCCESS` as a whole word with no remaining-task list counts as success.
    pub fn from_reply(reply: &str) -> Self {
        let upper = reply.to_uppercase();
        let says_success = upper
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word == "SUCCESS");
        if says_success && !upper.contains("REMAINING_TASKS") {
            Review::Success
        } else {
            Review::Remaining(reply.trim().to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Review::Success)
    }
}

/// Judges a mission report against the mission
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, mission: &str, report: &str) -> crate::Result<Review>;
}

/// Reviewer backed by a chat provider
pub struct ProviderReviewer {
    provider: Arc<dyn Provider>,
    sampling: Sampling,
}

impl ProviderReviewer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            sampling: Sampling {
                model: model.into(),
                temperature: 0.1,
                max_tokens: 4096,
            },
        }
    }
}

#[async_trait]
impl Reviewer for ProviderReviewer {
    async fn review(&self, mission: &str, report: &str) -> crate::Result<Review> {
        let params = ChatParams {
            model: self.sampling.model.clone(),
            messages: vec![
                Message::system(REVIEWER_PERSONA),
                Message::user(format!("Mission: {}\n\nAgent Report: {}", mission, report)),
            ],
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
            json_mode: false,
        };
        let response = self.provider.chat(params).await?;
        Ok(Review::from_reply(response.text_or_empty()))
    }
}
