//! Verification gate: a proof command decides whether the mission is done

use std::sync::Arc;

use tracing::{info, warn};

use crate::runner::CommandRunner;

/// Outcome of one verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Proof command exited zero
    Passed,
    /// Proof command ran and failed
    Failed { exit_code: i32 },
    /// No proof command was offered this cycle
    NotVerified,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

/// Runs proof commands through the shared [`CommandRunner`]
pub struct VerificationGate {
    runner: Arc<CommandRunner>,
    corrective: bool,
}

impl VerificationGate {
    /// Gate that lets proof commands trigger discovery like any other command
    pub fn new(runner: Arc<CommandRunner>) -> Self {
        Self {
            runner,
            corrective: true,
        }
    }

    /// `false` makes verification read-only: one execution, no discovery
    pub fn with_discovery(mut self, corrective: bool) -> Self {
        self.corrective = corrective;
        self
    }

    /// Check `proof`. Blank commands count as absent.
    pub async fn check(&self, proof: Option<&str>) -> Verdict {
        let proof = match proof.map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => return Verdict::NotVerified,
        };

        info!("◆ VERIFY: {}", proof);
        let result = if self.corrective {
            self.runner.run(proof).await
        } else {
            self.runner.run_once(proof).await
        };

        match result {
            Ok(output) if output.success() => {
                info!("◆ VERIFICATION PASSED");
                Verdict::Passed
            }
            Ok(output) => {
                info!("◆ VERIFICATION FAILED (exit {})", output.exit_code);
                Verdict::Failed {
                    exit_code: output.exit_code,
                }
            }
            Err(e) => {
                warn!("verification command could not run: {}", e);
                Verdict::Failed { exit_code: -1 }
            }
        }
    }
}
