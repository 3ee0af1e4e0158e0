//! Mission loop: propose, think, act, observe, verify

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use sortie_config::Config;
use sortie_state::{SharedManifest, ThoughtEngine};

use crate::context::MissionContext;
use crate::decision::DecisionSource;
use crate::runner::preview;
use crate::step::{parse_step, Step};
use crate::tools::ToolRegistry;
use crate::verify::{Verdict, VerificationGate};

/// Why a mission run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// A proof command passed
    Verified,
    /// Iteration ceiling reached without proof
    Exhausted,
    /// The decision source kept failing
    Error,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::Verified => "STOP_VERIFIED",
            StopReason::Exhausted => "STOP_EXHAUSTED",
            StopReason::Error => "STOP_ERROR",
        };
        f.write_str(label)
    }
}

/// Final report of one mission run
#[derive(Debug, Clone, Serialize)]
pub struct MissionReport {
    pub mission: String,
    pub stop: StopReason,
    pub iterations: u32,
    pub last_thought: Option<String>,
    pub last_observation: String,
    /// Proof command that ended the run, when verified
    pub verified_by: Option<String>,
}

impl MissionReport {
    pub fn verified(&self) -> bool {
        self.stop == StopReason::Verified
    }

    /// Plain-text report printed to stdout and handed to the reviewer
    pub fn summary(&self) -> String {
        let mut out = format!(
            "MISSION: {}\nOUTCOME: {}\nITERATIONS: {}",
            self.mission, self.stop, self.iterations
        );
        if let Some(proof) = &self.verified_by {
            out.push_str(&format!("\nVERIFIED BY: {}", proof));
        }
        if let Some(thought) = &self.last_thought {
            out.push_str(&format!("\nLAST THOUGHT: {}", thought));
        }
        out.push_str(&format!("\nLAST OBSERVATION:\n{}", self.last_observation));
        out
    }
}

/// Ceilings for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub max_iterations: u32,
    pub max_decision_failures: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_decision_failures: 3,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.agent.max_iterations,
            max_decision_failures: config.agent.max_decision_failures,
        }
    }
}

/// Drives one mission at a time to a terminal state
pub struct MissionLoop<D: DecisionSource> {
    decision: D,
    tools: ToolRegistry,
    gate: VerificationGate,
    manifest: SharedManifest,
    thoughts: ThoughtEngine,
    settings: LoopSettings,
}

impl<D: DecisionSource> MissionLoop<D> {
    pub fn new(
        decision: D,
        tools: ToolRegistry,
        gate: VerificationGate,
        manifest: SharedManifest,
        thoughts: ThoughtEngine,
    ) -> Self {
        Self {
            decision,
            tools,
            gate,
            manifest,
            thoughts,
            settings: LoopSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn thoughts(&self) -> &ThoughtEngine {
        &self.thoughts
    }

    pub fn manifest(&self) -> &SharedManifest {
        &self.manifest
    }

    async fn propose(&self, context: &MissionContext) -> Result<Step, String> {
        let snapshot = self.manifest.lock().await.snapshot();
        let raw = self
            .decision
            .propose(context, &snapshot, &self.tools.descriptors())
            .await
            .map_err(|e| e.to_string())?;
        parse_step(&raw).map_err(|e| e.to_string())
    }

    /// Run `mission` until verified, out of iterations, or the decision
    /// source fails too many times in a row. Never returns an error: every
    /// failure below this point becomes an observation.
    pub async fn run(&mut self, mission: &str) -> MissionReport {
        let mut ctx = MissionContext::new(mission);
        let failure_limit = self.settings.max_decision_failures.max(1);
        info!("◆ MISSION: {}", mission);

        while ctx.iteration < self.settings.max_iterations {
            ctx.iteration += 1;
            info!(
                "◆ ITERATION {}/{}",
                ctx.iteration, self.settings.max_iterations
            );

            let step = match self.propose(&ctx).await {
                Ok(step) => {
                    ctx.decision_failures = 0;
                    step
                }
                Err(e) => {
                    ctx.decision_failures += 1;
                    warn!(
                        "decision failed ({}/{}): {}",
                        ctx.decision_failures, failure_limit, e
                    );
                    ctx.last_observation = format!("Error decoding decision: {}", e);
                    if ctx.decision_failures >= failure_limit {
                        return self.finish(ctx, StopReason::Error, None);
                    }
                    continue;
                }
            };
            debug!("step: {:?}", step);

            if let Err(e) = self
                .thoughts
                .record(step.thought.clone(), step.expectation.clone())
                .await
            {
                warn!("failed to write thought log: {}", e);
            }
            ctx.last_thought = Some(step.thought.clone());

            ctx.last_observation = self.tools.dispatch(&step.tool, step.input.clone()).await;
            info!("◆ OBSERVATION: {}", preview(&ctx.last_observation));

            let proof = step.verification();
            match self.gate.check(proof).await {
                Verdict::Passed => {
                    let proof = proof.map(str::to_string);
                    self.checkpoint(&ctx, proof.as_deref()).await;
                    return self.finish(ctx, StopReason::Verified, proof);
                }
                Verdict::Failed { exit_code } => {
                    ctx.last_observation.push_str(&format!(
                        "\n\nVERIFICATION FAILED (exit {}): {}",
                        exit_code,
                        proof.unwrap_or_default()
                    ));
                }
                Verdict::NotVerified => {}
            }
        }

        self.finish(ctx, StopReason::Exhausted, None)
    }

    async fn checkpoint(&self, ctx: &MissionContext, proof: Option<&str>) {
        let label = format!(
            "verified at iteration {}: {}",
            ctx.iteration,
            proof.unwrap_or_default()
        );
        let mut manifest = self.manifest.lock().await;
        if let Err(e) = manifest.add_checkpoint(label).await {
            warn!("failed to persist checkpoint: {}", e);
        }
    }

    fn finish(
        &self,
        ctx: MissionContext,
        stop: StopReason,
        verified_by: Option<String>,
    ) -> MissionReport {
        info!("◆ {} after {} iteration(s)", stop, ctx.iteration);
        MissionReport {
            mission: ctx.mission,
            stop,
            iterations: ctx.iteration,
            last_thought: ctx.last_thought,
            last_observation: ctx.last_observation,
            verified_by,
        }
    }
}
