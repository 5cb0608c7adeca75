use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use nodekit_agent::config::{AgentConfig, ConfigError};

fn load(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AgentConfig::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn trigger_mode_is_the_default_with_defaults_applied() {
    let config = load(&[("COMFYUI_URL", "http://127.0.0.1:8188/")]).unwrap();
    let settings = assert_matches!(config, AgentConfig::ComfyUITrigger(s) => s);

    assert_eq!(settings.credentials.api_url, "http://127.0.0.1:8188");
    assert_eq!(settings.credentials.api_token, None);
    assert_eq!(settings.credentials.header_key, "Authorization");
    assert_eq!(settings.trigger.filter.event_type, "all");
    assert_eq!(settings.trigger.filter.prompt_id, None);
    assert_eq!(settings.trigger.retry.interval, Duration::from_secs(5));
    assert_eq!(settings.trigger.retry.max_retries, None);
    assert_eq!(settings.trigger.heartbeat, None);
}

#[test]
fn trigger_overrides_are_read() {
    let config = load(&[
        ("AGENT_MODE", "comfyui-trigger"),
        ("COMFYUI_URL", "https://comfy.example.com"),
        ("COMFYUI_TOKEN", "Bearer t"),
        ("COMFYUI_HEADER_KEY", "X-Api-Key"),
        ("COMFYUI_EVENT_TYPE", "executed"),
        ("COMFYUI_PROMPT_ID", "p1"),
        ("RECONNECT_INTERVAL_SECS", "2"),
        ("MAX_RETRIES", "3"),
        ("HEARTBEAT_INTERVAL_SECS", "30"),
    ])
    .unwrap();
    let settings = assert_matches!(config, AgentConfig::ComfyUITrigger(s) => s);

    assert_eq!(
        settings.credentials.auth(),
        Some(("X-Api-Key".to_string(), "Bearer t".to_string()))
    );
    assert_eq!(settings.trigger.filter.event_type, "executed");
    assert_eq!(settings.trigger.filter.prompt_id.as_deref(), Some("p1"));
    assert_eq!(settings.trigger.retry.interval, Duration::from_secs(2));
    assert_eq!(settings.trigger.retry.max_retries, Some(3));
    assert_eq!(settings.trigger.heartbeat, Some(Duration::from_secs(30)));
}

#[test]
fn empty_values_count_as_unset() {
    let config = load(&[
        ("COMFYUI_URL", "http://h"),
        ("COMFYUI_EVENT_TYPE", "  "),
        ("MAX_RETRIES", ""),
    ])
    .unwrap();
    let settings = assert_matches!(config, AgentConfig::ComfyUITrigger(s) => s);
    assert_eq!(settings.trigger.filter.event_type, "all");
    assert_eq!(settings.trigger.retry.max_retries, None);
}

#[test]
fn missing_comfyui_url_is_named() {
    let err = load(&[]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("COMFYUI_URL"));
    assert_eq!(err.to_string(), "COMFYUI_URL environment variable is required");
}

#[test]
fn invalid_numbers_are_rejected() {
    let err = load(&[("COMFYUI_URL", "http://h"), ("MAX_RETRIES", "lots")]).unwrap_err();
    assert_matches!(err, ConfigError::Invalid { var: "MAX_RETRIES", .. });
}

#[test]
fn nocobase_mode_requires_its_variables() {
    let err = load(&[("AGENT_MODE", "nocobase"), ("NOCOBASE_BASE_URL", "http://nb")]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("NOCOBASE_TOKEN"));

    let config = load(&[
        ("AGENT_MODE", "nocobase"),
        ("NOCOBASE_BASE_URL", "http://nb/"),
        ("NOCOBASE_TOKEN", "tok"),
        ("NOCOBASE_ITEMS_FILE", "items.json"),
        ("CONTINUE_ON_FAIL", "true"),
    ])
    .unwrap();
    let settings = assert_matches!(config, AgentConfig::NocoBase(s) => s);
    assert_eq!(settings.credentials.base_url, "http://nb");
    assert_eq!(settings.items_file.to_str(), Some("items.json"));
    assert!(settings.continue_on_fail);
}

#[test]
fn comfyui_batch_mode_shares_the_comfyui_connection_variables() {
    let err = load(&[("AGENT_MODE", "comfyui"), ("COMFYUI_URL", "http://c")]).unwrap_err();
    assert_matches!(err, ConfigError::Missing("COMFYUI_ITEMS_FILE"));

    let config = load(&[
        ("AGENT_MODE", "comfyui"),
        ("COMFYUI_URL", "http://c:8188/"),
        ("COMFYUI_TOKEN", "t"),
        ("COMFYUI_ITEMS_FILE", "ops.json"),
        ("CONTINUE_ON_FAIL", "true"),
    ])
    .unwrap();
    let settings = assert_matches!(config, AgentConfig::ComfyUI(s) => s);
    assert_eq!(settings.credentials.api_url, "http://c:8188");
    assert_eq!(
        settings.credentials.auth(),
        Some(("Authorization".to_string(), "t".to_string()))
    );
    assert_eq!(settings.items_file.to_str(), Some("ops.json"));
    assert!(settings.continue_on_fail);
}

#[test]
fn unknown_mode_is_rejected() {
    let err = load(&[("AGENT_MODE", "both")]).unwrap_err();
    assert_matches!(err, ConfigError::Invalid { var: "AGENT_MODE", .. });
}
