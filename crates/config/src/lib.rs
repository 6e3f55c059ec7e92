//! Configuration loading and validation for thinkloop.
//!
//! Loads configuration from `~/.thinkloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.thinkloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// API key used by models that do not set their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model the agent reasons with
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used to write conversation summaries (falls back to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,

    /// Per-model endpoint, context size and pricing
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub memory: MemoryConfig,
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("debug", &self.debug)
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("summary_model", &self.summary_model)
            .field("models", &self.models)
            .field("agent", &self.agent)
            .field("memory", &self.memory)
            .finish()
    }
}

/// How to reach one model.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Wire protocol; only "openai" (chat completions) is supported
    #[serde(default = "default_api_type")]
    pub api_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Context window in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<ModelCost>,
}

fn default_api_type() -> String {
    "openai".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_type: default_api_type(),
            base_url: None,
            api_key: None,
            max_context: None,
            cost: None,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_type", &self.api_type)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("max_context", &self.max_context)
            .field("cost", &self.cost)
            .finish()
    }
}

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool rounds allowed before a run gives up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Per model call timeout; unset means no timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_iterations() -> usize {
    10
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Think step by step and use the available tools \
     when they help answer the user's question. When you have the final answer, \
     reply without calling any tool."
        .into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            call_timeout_secs: None,
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    #[default]
    SlidingWindow,
    Summarizing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub strategy: MemoryStrategy,

    /// Sliding window: most messages kept (system prompt excluded)
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Sliding window: most tokens kept (system prompt excluded)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Summarizing: share of the context reserved for recent messages
    #[serde(default = "default_reserve_ratio")]
    pub reserve_ratio: f64,

    /// Summarizing: where `<task_id>/summary.md` files live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
}

fn default_max_messages() -> usize {
    50
}
fn default_max_tokens() -> usize {
    8000
}
fn default_reserve_ratio() -> f64 {
    0.3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            strategy: MemoryStrategy::default(),
            max_messages: default_max_messages(),
            max_tokens: default_max_tokens(),
            reserve_ratio: default_reserve_ratio(),
            workspace: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            api_key: None,
            default_model: default_model(),
            summary_model: None,
            models: HashMap::new(),
            agent: AgentConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.thinkloop/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides:
    /// - `THINKLOOP_MODEL` replaces `default_model`
    /// - `THINKLOOP_API_KEY`, then `OPENAI_API_KEY`, fill a missing `api_key`
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("THINKLOOP_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(model) = var("THINKLOOP_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".thinkloop")
    }

    /// Where summary artifacts go: `memory.workspace`, else `~/.thinkloop/workspace`.
    pub fn workspace_dir(&self) -> PathBuf {
        self.memory
            .workspace
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// The model summaries are written with.
    pub fn summary_model(&self) -> &str {
        self.summary_model.as_deref().unwrap_or(&self.default_model)
    }

    /// Settings for `name`; unknown models get defaults.
    pub fn model(&self, name: &str) -> ModelConfig {
        self.models.get(name).cloned().unwrap_or_default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }
        if self.agent.call_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.call_timeout_secs must be > 0 when set".into(),
            ));
        }
        if self.memory.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_messages must be > 0".into(),
            ));
        }
        if self.memory.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_tokens must be > 0".into(),
            ));
        }
        let ratio = self.memory.reserve_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "memory.reserve_ratio must be between 0 and 1 (exclusive), got {ratio}"
            )));
        }
        for (name, model) in &self.models {
            if model.api_type != "openai" {
                return Err(ConfigError::ValidationError(format!(
                    "model '{name}': unsupported api_type '{}'",
                    model.api_type
                )));
            }
            if model.max_context == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "model '{name}': max_context must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
