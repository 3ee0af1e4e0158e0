//! Tests for supervised retries

mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::{step, Fixture, ScriptedDecision};
use mockall::mock;
use serde_json::json;
use sortie_agent::supervisor::retry_mission;
use sortie_agent::{AgentError, Review, Reviewer, Supervisor};

mock! {
    pub Reviewer {}

    #[async_trait]
    impl Reviewer for Reviewer {
        async fn review(&self, mission: &str, report: &str) -> sortie_agent::Result<Review>;
    }
}

fn verified_script() -> ScriptedDecision {
    ScriptedDecision::new([step("Bash", json!("true"), Some("true"))])
}

#[tokio::test]
async fn test_accepted_on_first_attempt() {
    let fx = Fixture::new();
    let mut mission_loop = fx.mission_loop(verified_script(), 3);

    let mut reviewer = MockReviewer::new();
    reviewer
        .expect_review()
        .withf(|mission, _| mission == "ship it")
        .times(1)
        .returning(|_, _| Ok(Review::Success));

    let supervisor = Supervisor::new(reviewer).with_cooldown(Duration::ZERO);
    let outcome = supervisor.run(&mut mission_loop, "ship it").await;

    assert!(outcome.accomplished);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.reports.len(), 1);
    assert!(outcome.feedback.is_none());
}

#[tokio::test]
async fn test_feedback_is_appended_on_retry() {
    let fx = Fixture::new();
    let decision = verified_script();
    let seen = decision.clone();
    let mut mission_loop = fx.mission_loop(decision, 3);

    let mut reviewer = MockReviewer::new();
    let mut calls = 0;
    reviewer.expect_review().times(2).returning(move |_, report| {
        calls += 1;
        assert!(report.contains("OUTCOME: STOP_VERIFIED"));
        if calls == 1 {
            Ok(Review::Remaining("REMAINING_TASKS: add tests".to_string()))
        } else {
            Ok(Review::Success)
        }
    });

    let supervisor = Supervisor::new(reviewer).with_cooldown(Duration::ZERO);
    let outcome = supervisor.run(&mut mission_loop, "build it").await;

    assert!(outcome.accomplished);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(
        seen.missions(),
        vec![
            "build it".to_string(),
            retry_mission("build it", "REMAINING_TASKS: add tests")
        ]
    );
}

#[tokio::test]
async fn test_gives_up_after_retries() {
    let fx = Fixture::new();
    let mut mission_loop = fx.mission_loop(verified_script(), 2);

    let mut reviewer = MockReviewer::new();
    reviewer
        .expect_review()
        .times(3)
        .returning(|_, _| Ok(Review::Remaining("still broken".to_string())));

    let supervisor = Supervisor::new(reviewer)
        .with_retries(3)
        .with_cooldown(Duration::from_millis(10));
    let outcome = supervisor.run(&mut mission_loop, "fix it").await;

    assert!(!outcome.accomplished);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.reports.len(), 3);
    assert_eq!(outcome.feedback.as_deref(), Some("still broken"));
}

#[tokio::test]
async fn test_review_error_counts_as_rejection() {
    let fx = Fixture::new();
    let mut mission_loop = fx.mission_loop(verified_script(), 2);

    let mut reviewer = MockReviewer::new();
    reviewer
        .expect_review()
        .times(1)
        .returning(|_, _| Err(AgentError::Subagent("reviewer offline".to_string())));

    let supervisor = Supervisor::new(reviewer)
        .with_retries(1)
        .with_cooldown(Duration::ZERO);
    let outcome = supervisor.run(&mut mission_loop, "anything").await;

    assert!(!outcome.accomplished);
    assert!(outcome.feedback.unwrap().contains("reviewer offline"));
}
