//! Tests for API key lookup: config file first, then environment

use serial_test::serial;
use sortie_config::{Config, ProviderKind};

fn clear_env() {
    for kind in [ProviderKind::Gemini, ProviderKind::OpenAi, ProviderKind::OpenRouter] {
        std::env::remove_var(kind.env_key());
    }
}

#[test]
#[serial]
fn test_api_key_none_when_unset() {
    clear_env();
    let config = Config::default();
    assert_eq!(config.api_key(), None);
    assert!(!config.has_api_key());
}

#[test]
#[serial]
fn test_api_key_from_config_file() {
    clear_env();
    let mut config = Config::default();
    config.providers.gemini.api_key = "gem-key".to_string();
    assert_eq!(config.api_key(), Some("gem-key".to_string()));
}

#[test]
#[serial]
fn test_api_key_falls_back_to_env() {
    clear_env();
    std::env::set_var("GEMINI_API_KEY", "  env-key  ");
    let config = Config::default();
    assert_eq!(config.api_key(), Some("env-key".to_string()));
    clear_env();
}

#[test]
#[serial]
fn test_config_file_key_wins_over_env() {
    clear_env();
    std::env::set_var("OPENAI_API_KEY", "env-key");
    let mut config = Config::default();
    config.agent.provider = ProviderKind::OpenAi;
    config.providers.openai.api_key = "file-key".to_string();
    assert_eq!(config.api_key(), Some("file-key".to_string()));
    clear_env();
}

#[test]
#[serial]
fn test_api_key_follows_selected_provider() {
    clear_env();
    let mut config = Config::default();
    config.providers.openrouter.api_key = "or-key".to_string();
    assert_eq!(config.api_key(), None);

    config.agent.provider = ProviderKind::OpenRouter;
    assert_eq!(config.api_key(), Some("or-key".to_string()));
}
