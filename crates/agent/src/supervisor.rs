//! Supervised retries: review each run and re-issue with feedback

use std::time::Duration;

use tracing::{info, warn};

use sortie_config::SupervisorConfig;

use crate::decision::{DecisionSource, Review, Reviewer};
use crate::loop_agent::{MissionLoop, MissionReport};

/// Mission text for a retry after a rejected attempt
pub fn retry_mission(mission: &str, feedback: &str) -> String {
    format!(
        "Original Mission: {}\n\nPrevious Attempt Failed. Feedback: {}. Try again.",
        mission, feedback
    )
}

/// Result of a supervised mission
#[derive(Debug, Clone)]
pub struct SupervisedOutcome {
    pub accomplished: bool,
    pub attempts: u32,
    pub reports: Vec<MissionReport>,
    /// Reviewer feedback from the last rejected attempt
    pub feedback: Option<String>,
}

impl SupervisedOutcome {
    pub fn last_report(&self) -> Option<&MissionReport> {
        self.reports.last()
    }
}

pub struct Supervisor<R: Reviewer> {
    reviewer: R,
    retries: u32,
    cooldown: Duration,
}

impl<R: Reviewer> Supervisor<R> {
    pub fn new(reviewer: R) -> Self {
        Self {
            reviewer,
            retries: 3,
            cooldown: Duration::from_secs(2),
        }
    }

    pub fn from_config(reviewer: R, config: &SupervisorConfig) -> Self {
        Self::new(reviewer)
            .with_retries(config.retries)
            .with_cooldown(Duration::from_secs(config.cooldown_secs))
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Run `mission` up to `retries` times, stopping at the first attempt
    /// the reviewer accepts. A failed review call counts as a rejection.
    pub async fn run<D: DecisionSource>(
        &self,
        mission_loop: &mut MissionLoop<D>,
        mission: &str,
    ) -> SupervisedOutcome {
        let attempts_allowed = self.retries.max(1);
        let mut outcome = SupervisedOutcome {
            accomplished: false,
            attempts: 0,
            reports: Vec::new(),
            feedback: None,
        };
        let mut current = mission.to_string();

        while outcome.attempts < attempts_allowed {
            outcome.attempts += 1;
            info!("◆ SUPERVISED ATTEMPT {}/{}", outcome.attempts, attempts_allowed);

            let report = mission_loop.run(&current).await;
            let review = match self.reviewer.review(mission, &report.summary()).await {
                Ok(review) => review,
                Err(e) => {
                    warn!("review failed: {}", e);
                    Review::Remaining(format!("Review unavailable: {}", e))
                }
            };
            outcome.reports.push(report);

            match review {
                Review::Success => {
                    info!("◆ MISSION ACCOMPLISHED");
                    outcome.accomplished = true;
                    outcome.feedback = None;
                    return outcome;
                }
                Review::Remaining(feedback) => {
                    warn!("attempt {} rejected: {}", outcome.attempts, feedback);
                    current = retry_mission(mission, &feedback);
                    outcome.feedback = Some(feedback);
                }
            }

            if outcome.attempts < attempts_allowed && !self.cooldown.is_zero() {
                tokio::time::sleep(self.cooldown).await;
            }
        }

        outcome
    }
}
