//! Configuration management for sortie
//!
//! Loads and saves mission parameters from `~/.sortie/config.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, expand_tilde, resolve_path, subagent_dir};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which decision-source backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenAi,
    OpenRouter,
}

impl ProviderKind {
    /// Environment variable consulted when the config file has no key
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Lowercase name, as accepted by `FromStr` and the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Credentials for one provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// All provider credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
}

/// Mission loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_decision_failures")]
    pub max_decision_failures: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            persona: None,
            max_iterations: default_max_iterations(),
            max_decision_failures: default_max_decision_failures(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_decision_failures() -> u32 {
    3
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

/// Shell execution parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub verify_with_discovery: bool,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: default_command_timeout(),
            verify_with_discovery: true,
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_command_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_max_output_bytes() -> usize {
    10_000
}

/// Sub-mission parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentConfig {
    #[serde(default = "default_subagent_timeout")]
    pub timeout_secs: u64,
    /// Directory for sub-mission artifacts; defaults to `~/.sortie/subagents`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for SubagentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_subagent_timeout(),
            dir: None,
        }
    }
}

fn default_subagent_timeout() -> u64 {
    300
}

/// Supervised retry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            cooldown_secs: default_cooldown(),
        }
    }
}

fn default_retries() -> u32 {
    3
}

fn default_cooldown() -> u64 {
    2
}

/// Locations of the fact store and thought log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_thought_log")]
    pub thought_log: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            thought_log: default_thought_log(),
        }
    }
}

fn default_manifest() -> String {
    "agent_state.json".to_string()
}

fn default_thought_log() -> String {
    "alpha.log".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub subagent: SubagentConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load from `~/.sortie/config.json`
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location; a missing file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to `~/.sortie/config.json`
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("saving config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    fn provider_config(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Gemini => &self.providers.gemini,
            ProviderKind::OpenAi => &self.providers.openai,
            ProviderKind::OpenRouter => &self.providers.openrouter,
        }
    }

    /// API key for a provider: config file first, then its env variable
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<String> {
        let key = &self.provider_config(kind).api_key;
        if !key.is_empty() {
            return Some(key.clone());
        }

        match std::env::var(kind.env_key()) {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => None,
        }
    }

    /// API key for the configured provider
    pub fn api_key(&self) -> Option<String> {
        self.api_key_for(self.agent.provider)
    }

    /// Custom endpoint for the configured provider, if any
    pub fn api_base(&self) -> Option<String> {
        self.provider_config(self.agent.provider)
            .api_base
            .clone()
            .filter(|b| !b.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Persona file, with `~` expanded
    pub fn persona_path(&self) -> Option<PathBuf> {
        self.agent.persona.as_deref().map(expand_tilde)
    }

    pub fn manifest_path(&self) -> PathBuf {
        expand_tilde(&self.state.manifest)
    }

    pub fn thought_log_path(&self) -> PathBuf {
        expand_tilde(&self.state.thought_log)
    }

    pub fn subagent_dir(&self) -> PathBuf {
        match &self.subagent.dir {
            Some(dir) => expand_tilde(dir),
            None => subagent_dir(),
        }
    }
}

/// Write a default config if none exists, then load it
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("config already exists at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("wrote default config to {:?}", config_path);
    }

    Config::load().await
}
