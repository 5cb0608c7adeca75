//! Agent configuration loaded from environment variables.
//!
//! | Env Var                   | Mode              | Default            |
//! |---------------------------|-------------------|--------------------|
//! | `AGENT_MODE`              | all               | `comfyui-trigger`  |
//! | `COMFYUI_URL`             | trigger, comfyui  | required           |
//! | `COMFYUI_TOKEN`           | trigger, comfyui  | none               |
//! | `COMFYUI_HEADER_KEY`      | trigger, comfyui  | `Authorization`    |
//! | `COMFYUI_EVENT_TYPE`      | trigger           | `all`              |
//! | `COMFYUI_PROMPT_ID`       | trigger           | none               |
//! | `RECONNECT_INTERVAL_SECS` | trigger           | `5`                |
//! | `MAX_RETRIES`             | trigger           | `-1` (unbounded)   |
//! | `HEARTBEAT_INTERVAL_SECS` | trigger           | `0` (off)          |
//! | `COMFYUI_ITEMS_FILE`      | comfyui           | required           |
//! | `NOCOBASE_BASE_URL`       | nocobase          | required           |
//! | `NOCOBASE_TOKEN`          | nocobase          | required           |
//! | `NOCOBASE_ITEMS_FILE`     | nocobase          | required           |
//! | `CONTINUE_ON_FAIL`        | comfyui, nocobase | `false`            |
//!
//! Empty values count as unset.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nodekit_comfyui::messages::{EventFilter, ALL_EVENTS};
use nodekit_comfyui::reconnect::{RetryPolicy, DEFAULT_RECONNECT_INTERVAL};
use nodekit_comfyui::trigger::DEFAULT_HEADER_KEY;
use nodekit_comfyui::{ComfyUICredentials, TriggerConfig};
use nodekit_nocobase::NocoBaseCredentials;

/// What the agent does once started.
#[derive(Debug, Clone)]
pub enum AgentConfig {
    /// Listen to a ComfyUI server and print events as JSON lines.
    ComfyUITrigger(TriggerSettings),
    /// Run a file of ComfyUI queue/models items once.
    ComfyUI(ComfyUIBatchSettings),
    /// Run a file of NocoBase operation items once.
    NocoBase(BatchSettings),
}

#[derive(Debug, Clone)]
pub struct TriggerSettings {
    pub credentials: ComfyUICredentials,
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub credentials: NocoBaseCredentials,
    /// JSON file holding one item object or an array of them.
    pub items_file: PathBuf,
    pub continue_on_fail: bool,
}

#[derive(Debug, Clone)]
pub struct ComfyUIBatchSettings {
    pub credentials: ComfyUICredentials,
    /// JSON file holding one item object or an array of them.
    pub items_file: PathBuf,
    pub continue_on_fail: bool,
}

impl AgentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        match env.get("AGENT_MODE").as_deref() {
            None | Some("comfyui-trigger") => Ok(Self::ComfyUITrigger(trigger_settings(&env)?)),
            Some("comfyui") => Ok(Self::ComfyUI(comfyui_batch_settings(&env)?)),
            Some("nocobase") => Ok(Self::NocoBase(batch_settings(&env)?)),
            Some(other) => Err(ConfigError::Invalid {
                var: "AGENT_MODE",
                value: other.to_string(),
                reason: "expected 'comfyui-trigger', 'comfyui' or 'nocobase'".into(),
            }),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// ---- private helpers ----

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

fn comfyui_credentials<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
) -> Result<ComfyUICredentials, ConfigError> {
    Ok(ComfyUICredentials {
        api_url: env.require("COMFYUI_URL")?.trim_end_matches('/').to_string(),
        api_token: env.get("COMFYUI_TOKEN"),
        header_key: env
            .get("COMFYUI_HEADER_KEY")
            .unwrap_or_else(|| DEFAULT_HEADER_KEY.to_string()),
    })
}

fn trigger_settings<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
) -> Result<TriggerSettings, ConfigError> {
    let credentials = comfyui_credentials(env)?;

    let interval_secs: u64 = env.parse(
        "RECONNECT_INTERVAL_SECS",
        DEFAULT_RECONNECT_INTERVAL.as_secs(),
    )?;
    let max_retries: i64 = env.parse("MAX_RETRIES", -1)?;
    let heartbeat_secs: u64 = env.parse("HEARTBEAT_INTERVAL_SECS", 0)?;

    let trigger = TriggerConfig {
        filter: EventFilter {
            event_type: env
                .get("COMFYUI_EVENT_TYPE")
                .unwrap_or_else(|| ALL_EVENTS.to_string()),
            prompt_id: env.get("COMFYUI_PROMPT_ID"),
        },
        retry: RetryPolicy::from_limit(Duration::from_secs(interval_secs), max_retries),
        heartbeat: (heartbeat_secs > 0).then(|| Duration::from_secs(heartbeat_secs)),
        ..TriggerConfig::default()
    };

    Ok(TriggerSettings {
        credentials,
        trigger,
    })
}

fn comfyui_batch_settings<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
) -> Result<ComfyUIBatchSettings, ConfigError> {
    Ok(ComfyUIBatchSettings {
        credentials: comfyui_credentials(env)?,
        items_file: PathBuf::from(env.require("COMFYUI_ITEMS_FILE")?),
        continue_on_fail: env.parse("CONTINUE_ON_FAIL", false)?,
    })
}

fn batch_settings<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
) -> Result<BatchSettings, ConfigError> {
    Ok(BatchSettings {
        credentials: NocoBaseCredentials::new(
            env.require("NOCOBASE_BASE_URL")?,
            env.require("NOCOBASE_TOKEN")?,
        ),
        items_file: PathBuf::from(env.require("NOCOBASE_ITEMS_FILE")?),
        continue_on_fail: env.parse("CONTINUE_ON_FAIL", false)?,
    })
}
