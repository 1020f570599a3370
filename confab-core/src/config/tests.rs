use std::collections::HashMap;
use confab_llm::ResponseFormat;
use tempfile::tempdir;

use super::*;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn two_providers() -> ConfabConfig {
    let mut config = ConfabConfig::default();
    config.add_provider("openai".to_string(), vars(&[("OPENAI_API_KEY", "sk-test")]), "gpt-4o-mini".to_string());
    config
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".confab.config");

    let mut config = two_providers();
    config.set_selected_provider(1).unwrap();
    config.get_selected_provider_mut().unwrap().temperature = Some(0.2);
    config.save_to(&path).unwrap();

    let loaded = ConfabConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.get_selected_provider().unwrap().provider, "openai");
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let error = ConfabConfig::load_from(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(error, ConfigError::NotFound(_)));
}

#[test]
fn test_invalid_selection_is_reset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"providers": [{"provider": "ollama", "env_vars": {}, "model": "llama3.2"}], "selected_provider": 7}"#,
    )
    .unwrap();

    let config = ConfabConfig::load_from(&path).unwrap();
    assert_eq!(config.selected_provider, 0);
    let provider = config.get_selected_provider().unwrap();
    assert_eq!(provider.max_messages, 10);
    assert_eq!(provider.max_tool_rounds, 5);
    assert_eq!(provider.response_format, ResponseFormat::Text);
    assert_eq!(provider.timeout(), None);
}

#[test]
fn test_provider_selection() {
    let mut config = two_providers();
    assert!(matches!(config.set_selected_provider(2), Err(ConfigError::ProviderIndex { index: 2, len: 2 })));
    config.set_selected_provider(1).unwrap();
    assert_eq!(config.list_providers(), vec![(0, "ollama", "llama3.2"), (1, "openai", "gpt-4o-mini")]);
    assert_eq!(config.find_providers_by_type("openai"), vec![1]);
    assert!(config.is_duplicate_config("openai", &vars(&[("OPENAI_API_KEY", "sk-test")]), "gpt-4o-mini"));
}

#[test]
fn test_remove_provider_adjusts_selection() {
    let mut config = two_providers();
    config.set_selected_provider(1).unwrap();

    let removed = config.remove_provider(0).unwrap();
    assert_eq!(removed.provider, "ollama");
    assert_eq!(config.selected_provider, 0);
    assert!(matches!(config.remove_provider(0), Err(ConfigError::LastProvider)));
}

#[test]
fn test_overrides_select_existing_provider() {
    let env = vars(&[("CONFAB_PROVIDER", "openai"), ("CONFAB_MODEL", "gpt-4o")]);
    let config = two_providers().with_overrides(|key| env.get(key).cloned());

    assert_eq!(config.selected_provider, 1);
    assert_eq!(config.get_selected_provider().unwrap().model, "gpt-4o");
    assert_eq!(config.providers.len(), 2);
}

#[test]
fn test_overrides_add_unknown_provider_from_env() {
    let env = vars(&[("CONFAB_PROVIDER", "zhipu"), ("ZHIPU_API_KEY", "zk-test")]);
    let config = ConfabConfig::default().with_overrides(|key| env.get(key).cloned());

    let selected = config.get_selected_provider().unwrap();
    assert_eq!(selected.provider, "zhipu");
    assert_eq!(selected.env_vars.get("ZHIPU_API_KEY").map(String::as_str), Some("zk-test"));
}

#[test]
fn test_client_from_selected_provider() {
    let mut config = two_providers();
    config.set_selected_provider(1).unwrap();

    let client = config.client().unwrap();
    assert_eq!(client.provider_name(), "openai");
    assert_eq!(client.model(), "gpt-4o-mini");
}

#[test]
fn test_client_missing_key() {
    let mut config = ConfabConfig::default();
    let index = config.add_provider("openai".to_string(), HashMap::new(), String::new());
    config.set_selected_provider(index).unwrap();
    assert!(matches!(config.client(), Err(ConfigError::Client { .. })));
}

#[test]
fn test_service_builder_uses_provider_settings() {
    let mut config = ConfabConfig::default();
    let provider = config.get_selected_provider_mut().unwrap();
    provider.temperature = Some(0.3);
    provider.max_tool_rounds = 2;
    provider.timeout_secs = Some(30);

    let service = config.service_builder().unwrap().build().unwrap();
    assert_eq!(service.params().model, "llama3.2");
    assert_eq!(service.params().temperature, Some(0.3));
    assert_eq!(service.max_tool_rounds(), 2);
}
