//! Mission execution core
//!
//! Propose a step, record the thought, run the tool, observe, verify:
//! repeated until a proof command passes or the iteration ceiling is hit.

use thiserror::Error;

pub mod context;
pub mod decision;
pub mod discovery;
pub mod loop_agent;
pub mod runner;
pub mod step;
pub mod subagent;
pub mod supervisor;
pub mod tools;
pub mod verify;

pub use context::{ContextBuilder, MissionContext};
pub use decision::{DecisionSource, ProviderDecisionSource, ProviderReviewer, Review, Reviewer};
pub use discovery::DiscoveryResolver;
pub use loop_agent::{LoopSettings, MissionLoop, MissionReport, StopReason};
pub use runner::{CommandOutput, CommandRunner};
pub use step::{parse_step, Step, StepError};
pub use subagent::{SubagentLauncher, SubagentManager};
pub use supervisor::{SupervisedOutcome, Supervisor};
pub use tools::{ToolDescriptor, ToolRegistry, ToolTrait};
pub use verify::{VerificationGate, Verdict};

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool failed: {0}")]
    ToolExecution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("provider error: {0}")]
    Provider(#[from] sortie_provider::ProviderError),

    #[error("state error: {0}")]
    State(#[from] sortie_state::StateError),

    #[error("sub-agent error: {0}")]
    Subagent(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
