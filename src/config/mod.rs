use crate::core::error::CinechatError;
use crate::providers::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    OpenRouter,
    Fireworks,
    #[default]
    Anthropic,
}

impl Provider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAI),
            "openrouter" => Some(Provider::OpenRouter),
            "fireworks" => Some(Provider::Fireworks),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::Fireworks => "fireworks",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Fireworks => "https://api.fireworks.ai/inference/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o",
            Provider::OpenRouter => "anthropic/claude-3.5-sonnet",
            Provider::Fireworks => "accounts/fireworks/models/qwen2p5-coder-32b-instruct",
            Provider::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::Fireworks => "FIREWORKS_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: GenerationConfig::DEFAULT_TEMPERATURE,
            max_output_tokens: GenerationConfig::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Limits applied to every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_round_trips: usize,
    pub request_timeout_secs: u64,
    pub fragment_timeout_secs: u64,
    pub handler_timeout_secs: u64,
    pub session_idle_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_round_trips: 5,
            request_timeout_secs: 60,
            fragment_timeout_secs: 30,
            handler_timeout_secs: 15,
            session_idle_timeout_secs: 30 * 60,
        }
    }
}

impl AgentSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fragment_timeout(&self) -> Duration {
        Duration::from_secs(self.fragment_timeout_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

/// Where the movie functions live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for MovieServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    pub active_provider: Option<Provider>,
    #[serde(default)]
    pub providers: HashMap<Provider, ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub movies: MovieServiceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cinechat")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn input_history_path() -> PathBuf {
        Self::config_dir().join("input_history.txt")
    }

    /// Loads `.env` from the working directory or one of its parents into
    /// the process environment, overriding variables already set. Returns
    /// the file that was read.
    pub fn load_env_file() -> Option<PathBuf> {
        dotenvy::dotenv_override().ok()
    }

    pub fn load_env_file_from(path: &Path) -> Result<(), CinechatError> {
        dotenvy::from_path_override(path)
            .map_err(|e| CinechatError::Config(format!("Read {}: {}", path.display(), e)))
    }

    /// Loads the user config, writing a default file on first run.
    pub fn load() -> Result<Config, CinechatError> {
        let path = Self::config_path();
        if path.exists() {
            return Self::load_from(&path);
        }

        let config = Config::default();
        let _ = config.save_to(&path);
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Config, CinechatError> {
        let contents = fs::read_to_string(path)?;
        serde_yml::from_str::<Config>(&contents)
            .map_err(|e| CinechatError::Config(format!("Parse {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CinechatError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        self.active_provider.unwrap_or_default()
    }

    /// Provider settings with the API key falling back to the environment.
    pub fn provider_config(&self, provider: Provider) -> ProviderConfig {
        let mut config = self.providers.get(&provider).cloned().unwrap_or_default();
        if config.api_key.is_none() {
            config.api_key = std::env::var(provider.api_key_env()).ok();
        }
        config
    }

    pub fn generation_config(&self, provider: Provider) -> GenerationConfig {
        let model = self
            .providers
            .get(&provider)
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());

        GenerationConfig {
            model_identifier: model,
            temperature: self.generation.temperature,
            max_output_tokens: self.generation.max_output_tokens,
        }
    }

    /// The system prompt installed as message 0 of every session.
    pub fn system_prompt(&self) -> Result<String, CinechatError> {
        match &self.system_prompt_path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                CinechatError::Config(format!("Read system prompt {}: {}", path.display(), e))
            }),
            None => Ok(crate::prompt::SYSTEM_PROMPT.to_string()),
        }
    }
}
