//! Tests for sub-mission spawning, using `sh -c` as a stand-in agent binary.
//!
//! The launcher appends `--state <file> --log <file> -- <mission>`, so inside
//! the script `$0` is `--state` and the mission is `$5`.

use std::time::Duration;

use serde_json::json;
use sortie_agent::tools::{PollSubAgentTool, SpawnSubAgentTool, ToolTrait};
use sortie_agent::{SubagentLauncher, SubagentManager};
use std::sync::Arc;
use tempfile::TempDir;

fn manager(dir: &TempDir, script: &str, timeout: Duration) -> SubagentManager {
    let launcher = SubagentLauncher::new("sh", dir.path().join("subagents"))
        .with_args(["-c", script])
        .with_working_dir(dir.path())
        .with_timeout(timeout);
    SubagentManager::new(launcher)
}

fn handle_of(ack: &str) -> String {
    ack.split("HANDLE: ")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .unwrap()
        .trim()
        .to_string()
}

#[tokio::test]
async fn test_blocking_spawn_returns_output() {
    let dir = TempDir::new().unwrap();
    let manager = manager(
        &dir,
        "echo \"mission=$5\"; echo warn >&2; exit 3",
        Duration::from_secs(10),
    );

    let result = manager.spawn("count the files", true).await.unwrap();

    assert!(result.starts_with("Sub-Agent completed (exit 3)"), "{}", result);
    assert!(result.contains("mission=count the files"));
    assert!(result.contains("STDERR:\nwarn"));
}

#[tokio::test]
async fn test_child_gets_its_own_state_files() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir, "echo \"$1|$3\"", Duration::from_secs(10));

    let result = manager.spawn("m", true).await.unwrap();

    let subagents = dir.path().join("subagents");
    assert!(result.contains(subagents.to_str().unwrap()));
    assert!(result.contains("agent_state.json|"));
    assert!(result.contains("alpha.log"));
}

#[tokio::test]
async fn test_child_argument_vector() {
    let dir = TempDir::new().unwrap();
    let launcher = SubagentLauncher::new("sh", dir.path().join("subagents"))
        .with_args(["-c", "printf '<%s>' \"$0\" \"$@\"", "run"])
        .with_inherited_args(["--config", "/etc/team.json", "--provider", "openai"])
        .with_working_dir(dir.path())
        .with_timeout(Duration::from_secs(10));
    let manager = SubagentManager::new(launcher);

    let result = manager.spawn("-v looks like a flag", true).await.unwrap();

    let state_dir = dir.path().join("subagents");
    let expected_prefix = "<run><--config></etc/team.json><--provider><openai><--state><";
    assert!(result.contains(expected_prefix), "{}", result);
    assert!(result.contains(state_dir.to_str().unwrap()));
    assert!(result.contains("/agent_state.json><--log><"));
    assert!(
        result.contains("/alpha.log><--><-v looks like a flag>"),
        "{}",
        result
    );
}

#[tokio::test]
async fn test_blocking_spawn_times_out() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir, "sleep 5", Duration::from_millis(200));

    let result = manager.spawn("slow", true).await.unwrap();
    assert!(result.starts_with("Sub-Agent timed out"), "{}", result);
}

#[tokio::test]
async fn test_detached_spawn_can_be_polled() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir, "echo \"working on $5\"; exit 0", Duration::from_secs(10));

    let ack = manager.spawn("background job", false).await.unwrap();
    assert!(ack.starts_with("Sub-Agent spawned (non-blocking). HANDLE: "));
    let handle = handle_of(&ack);

    let mut status = String::new();
    for _ in 0..50 {
        status = manager.poll(&handle).await.unwrap();
        if status.starts_with("STATUS: FINISHED") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(status.starts_with("STATUS: FINISHED (exit 0)"), "{}", status);
    assert!(status.contains("working on background job"));
    assert!(dir
        .path()
        .join("subagents")
        .join(format!("{}.log", handle))
        .exists());
    assert_eq!(manager.running_count().await, 0);

    let again = manager.poll(&handle).await.unwrap();
    assert!(again.starts_with("STATUS: FINISHED (exit 0)"), "{}", again);
}

#[tokio::test]
async fn test_detached_spawn_reports_running() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir, "sleep 5", Duration::from_secs(10));

    let ack = manager.spawn("long job", false).await.unwrap();
    let status = manager.poll(&handle_of(&ack)).await.unwrap();

    assert!(status.starts_with("STATUS: RUNNING"));
    assert_eq!(manager.running_count().await, 1);
}

#[tokio::test]
async fn test_poll_unknown_handle() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir, "true", Duration::from_secs(10));
    assert!(manager.poll("no-such-handle").await.is_err());
}

#[tokio::test]
async fn test_spawn_tools() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(manager(&dir, "echo \"$5\"", Duration::from_secs(10)));
    let spawn = SpawnSubAgentTool::new(manager.clone());
    let poll = PollSubAgentTool::new(manager);

    let result = spawn
        .execute(json!({"mission": "hello child"}))
        .await
        .unwrap();
    assert!(result.contains("hello child"));

    assert!(spawn.execute(json!({"mission": "  "})).await.is_err());

    let ack = spawn
        .execute(json!({"mission": "later", "blocking": false}))
        .await
        .unwrap();
    let status = poll
        .execute(json!({"handle": handle_of(&ack)}))
        .await
        .unwrap();
    assert!(status.starts_with("STATUS: "));
}
