//! Decoding the decision source's reply into a [`Step`]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a reply could not be turned into a step
#[derive(Error, Debug)]
pub enum StepError {
    #[error("empty response")]
    Empty,

    #[error("no JSON object in response")]
    NoJsonObject,

    #[error("invalid step JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("step names no tool")]
    MissingTool,
}

/// One proposed decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub expectation: String,
    #[serde(alias = "tool_name")]
    pub tool: String,
    #[serde(default, alias = "tool_input")]
    pub input: Value,
    #[serde(default, alias = "verification_command")]
    pub verification: Option<String>,
}

impl Step {
    /// Proof command, if the step carried a non-blank one
    pub fn verification(&self) -> Option<&str> {
        self.verification
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Decode a step from raw model text.
///
/// Code fences and surrounding prose are tolerated: the outermost `{...}`
/// span is what gets decoded.
pub fn parse_step(raw: &str) -> Result<Step, StepError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StepError::Empty);
    }

    let start = raw.find('{').ok_or(StepError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(StepError::NoJsonObject)?;
    if end < start {
        return Err(StepError::NoJsonObject);
    }

    let mut step: Step = serde_json::from_str(&raw[start..=end])?;
    step.tool = step.tool.trim().to_string();
    if step.tool.is_empty() {
        return Err(StepError::MissingTool);
    }
    if step.verification().is_none() {
        step.verification = None;
    }
    Ok(step)
}
