//! Sortie command implementations

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use sortie_agent::tools::{register_default_tools, ToolRegistry};
use sortie_agent::{
    CommandRunner, ContextBuilder, LoopSettings, MissionLoop, ProviderDecisionSource,
    ProviderReviewer, SubagentManager, Supervisor, VerificationGate,
};
use sortie_config::{self, Config, ProviderKind};
use sortie_provider::{GeminiProvider, OpenAiProvider, Provider};
use sortie_state::{StateManifest, ThoughtEngine};

use crate::MissionArgs;

/// Exit code when every supervised attempt was rejected
const EXIT_REJECTED: i32 = 2;

async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(&path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().await.context("failed to load config")?,
    };
    Ok(config)
}

/// Fold per-run CLI options into the loaded config
fn apply_overrides(config: &mut Config, args: &MissionArgs) {
    if let Some(provider) = args.provider {
        config.agent.provider = provider;
    }
    if let Some(model) = &args.model {
        config.agent.model = model.clone();
    }
    if let Some(persona) = &args.persona {
        config.agent.persona = Some(absolute(persona).to_string_lossy().to_string());
    }
    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = max;
    }
}

/// Mission text: the contents of `input` if it names a readable file,
/// otherwise `input` itself.
pub async fn resolve_mission(input: &str) -> Result<String> {
    let candidate = Path::new(input);
    let is_file = !input.contains('\n') && input.len() < 4096 && candidate.is_file();

    let mission = if is_file {
        info!("reading mission from {}", candidate.display());
        tokio::fs::read_to_string(candidate)
            .await
            .with_context(|| format!("failed to read mission file {}", candidate.display()))?
    } else {
        input.to_string()
    };

    let mission = mission.trim().to_string();
    if mission.is_empty() {
        bail!("No mission given. Pass mission text or a path to a mission file.");
    }
    Ok(mission)
}

fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let kind = config.agent.provider;
    let api_key = config.api_key().with_context(|| {
        format!(
            "No API key configured. Set {} or add it to {}",
            kind.env_key(),
            sortie_config::config_path().display()
        )
    })?;
    let model = Some(config.agent.model.clone());

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key, config.api_base(), model)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(api_key, config.api_base(), model)),
        ProviderKind::OpenRouter => match config.api_base() {
            Some(base) => Arc::new(OpenAiProvider::new(api_key, Some(base), model)),
            None => Arc::new(OpenAiProvider::openrouter(api_key, model)),
        },
    };
    Ok(provider)
}

/// Children run in the working directory, so paths they inherit must not
/// depend on the parent's current directory.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Relative state paths live in the working directory
fn anchor(path: PathBuf, workdir: &Path) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        workdir.join(path)
    }
}

fn working_dir(args: &MissionArgs) -> Result<PathBuf> {
    let dir = match &args.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    if !dir.is_dir() {
        bail!("working directory {} does not exist", dir.display());
    }
    Ok(dir)
}

/// Everything a run needs, wired from config
struct Mission {
    text: String,
    config: Config,
    provider: Arc<dyn Provider>,
    mission_loop: MissionLoop<ProviderDecisionSource>,
}

async fn prepare(args: MissionArgs, config_path: Option<PathBuf>) -> Result<Mission> {
    let config_path = config_path.map(|path| absolute(&path));
    let mut config = load_config(config_path.clone()).await?;
    apply_overrides(&mut config, &args);

    let text = resolve_mission(&args.mission).await?;
    let provider = build_provider(&config)?;
    let workdir = working_dir(&args)?;

    let manifest_path = anchor(args.state.unwrap_or_else(|| config.manifest_path()), &workdir);
    let log_path = anchor(args.log.unwrap_or_else(|| config.thought_log_path()), &workdir);
    let manifest = StateManifest::load(&manifest_path).await.into_shared();

    let runner = Arc::new(CommandRunner::from_config(
        manifest.clone(),
        &workdir,
        &config.runner,
    ));
    let subagents = Arc::new(
        SubagentManager::from_config(&config, config_path.as_deref(), &workdir)
            .context("failed to set up sub-agent launcher")?,
    );

    let mut tools = ToolRegistry::new();
    register_default_tools(
        &mut tools,
        runner.clone(),
        subagents,
        config.runner.max_output_bytes,
    );

    let gate = VerificationGate::new(runner).with_discovery(config.runner.verify_with_discovery);
    let context = ContextBuilder::load(config.persona_path().as_deref())
        .await
        .with_working_dir(&workdir);
    let decision = ProviderDecisionSource::from_config(provider.clone(), &config, context);

    let mission_loop = MissionLoop::new(
        decision,
        tools,
        gate,
        manifest,
        ThoughtEngine::new(&log_path),
    )
    .with_settings(LoopSettings::from_config(&config));

    info!(
        "◆ {} via {:?}, state {}, log {}",
        config.agent.model,
        config.agent.provider,
        manifest_path.display(),
        log_path.display()
    );

    Ok(Mission {
        text,
        config,
        provider,
        mission_loop,
    })
}

/// Run one mission and print its report
pub async fn run_command(args: MissionArgs, config_path: Option<PathBuf>) -> Result<i32> {
    let mut mission = prepare(args, config_path).await?;

    let report = mission.mission_loop.run(&mission.text).await;
    println!("{}", report.summary());
    Ok(0)
}

/// Run a mission under review
pub async fn supervise_command(
    args: MissionArgs,
    retries: Option<u32>,
    config_path: Option<PathBuf>,
) -> Result<i32> {
    let mut mission = prepare(args, config_path).await?;

    let reviewer = ProviderReviewer::new(mission.provider.clone(), mission.config.agent.model.clone());
    let mut supervisor = Supervisor::from_config(reviewer, &mission.config.supervisor);
    if let Some(retries) = retries {
        supervisor = supervisor.with_retries(retries);
    }

    let outcome = supervisor
        .run(&mut mission.mission_loop, &mission.text)
        .await;

    if let Some(report) = outcome.last_report() {
        println!("{}", report.summary());
    }
    if outcome.accomplished {
        println!("\n◆ MISSION ACCOMPLISHED after {} attempt(s)", outcome.attempts);
        Ok(0)
    } else {
        println!("\n◆ MISSION FAILED after {} attempt(s)", outcome.attempts);
        if let Some(feedback) = &outcome.feedback {
            println!("REMAINING:\n{}", feedback);
        }
        Ok(EXIT_REJECTED)
    }
}

/// Write the default config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing Sortie...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = sortie_config::init().await?;

    println!("Config: {}", sortie_config::config_path().display());
    println!("\n◆ Sortie initialized");
    println!("\nNext steps:");
    println!(
        "  1. Export {} or add the key to the config file",
        config.agent.provider.env_key()
    );
    println!("  2. Run a mission: sortie run \"create hello.txt containing hi\"");

    Ok(())
}

/// Print the manifest as pretty JSON
pub async fn state_command(state: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path).await?;
    let path = state.unwrap_or_else(|| config.manifest_path());
    if !path.exists() {
        warn!("no manifest at {}", path.display());
    }

    let manifest = StateManifest::load(&path).await;
    println!("{}", serde_json::to_string_pretty(manifest.data())?);
    Ok(())
}

/// Print the last `lines` thought log entries
pub async fn thoughts_command(
    lines: usize,
    log: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path).await?;
    let path = log.unwrap_or_else(|| config.thought_log_path());
    if !path.exists() {
        println!("No thoughts recorded at {}", path.display());
        return Ok(());
    }

    for line in ThoughtEngine::tail(&path, lines).await? {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(mission: &str) -> MissionArgs {
        MissionArgs {
            mission: mission.to_string(),
            model: None,
            persona: None,
            provider: None,
            max_iterations: None,
            state: None,
            log: None,
            workdir: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_mission_literal() {
        let mission = resolve_mission("  fix the build  ").await.unwrap();
        assert_eq!(mission, "fix the build");
    }

    #[tokio::test]
    async fn test_resolve_mission_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.md");
        tokio::fs::write(&path, "Deploy the service\n").await.unwrap();

        let mission = resolve_mission(path.to_str().unwrap()).await.unwrap();
        assert_eq!(mission, "Deploy the service");
    }

    #[test]
    fn test_resolve_mission_empty() {
        assert!(tokio_test::block_on(resolve_mission("   ")).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let mut a = args("m");
        a.provider = Some(ProviderKind::OpenAi);
        a.model = Some("gpt-4o".to_string());
        a.max_iterations = Some(3);

        apply_overrides(&mut config, &a);
        assert_eq!(config.agent.provider, ProviderKind::OpenAi);
        assert_eq!(config.agent.model, "gpt-4o");
        assert_eq!(config.agent.max_iterations, 3);
    }

    #[test]
    fn test_persona_override_is_absolute() {
        let mut config = Config::default();
        let mut a = args("m");
        a.persona = Some(PathBuf::from("personas/sre.md"));

        apply_overrides(&mut config, &a);
        let persona = config.persona_path().unwrap();
        assert!(persona.is_absolute());
        assert!(persona.ends_with("personas/sre.md"));
    }

    #[test]
    fn test_anchor() {
        let base = Path::new("/work");
        assert_eq!(
            anchor(PathBuf::from("agent_state.json"), base),
            PathBuf::from("/work/agent_state.json")
        );
        assert_eq!(
            anchor(PathBuf::from("/tmp/s.json"), base),
            PathBuf::from("/tmp/s.json")
        );
    }
}
