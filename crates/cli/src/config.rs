//! Configuration loading from shelfscout.toml.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Model backend configuration.
    #[serde(default)]
    pub model: ModelConfig,

    /// YouTube Data API configuration.
    #[serde(default)]
    pub youtube: ProviderConfig,

    /// Custom Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Product catalog configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Gemini API key. Falls back to the GEMINI_API_KEY environment variable.
    pub api_key: Option<String>,

    /// Cap on tool invocations per chat turn.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

/// API-key-only provider configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
}

/// Custom Search needs a key and an engine id.
#[derive(Debug, Default, Deserialize)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
}

/// Product catalog configuration.
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_tool_calls() -> u32 {
    runtime::DEFAULT_MAX_TOOL_CALLS
}

fn default_db_path() -> String {
    "shelfscout.db".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the Gemini key from config or environment.
    pub fn model_api_key(&self) -> Result<String, ConfigError> {
        resolve_key(self.model.api_key.clone(), "GEMINI_API_KEY", "model.api_key")
    }

    /// Resolve the YouTube key from config or environment.
    pub fn youtube_api_key(&self) -> Result<String, ConfigError> {
        resolve_key(
            self.youtube.api_key.clone(),
            "YOUTUBE_API_KEY",
            "youtube.api_key",
        )
    }

    /// Resolve the Custom Search key and engine id.
    pub fn search_credentials(&self) -> Result<(String, String), ConfigError> {
        let key = resolve_key(
            self.search.api_key.clone(),
            "SEARCH_API_KEY",
            "search.api_key",
        )?;
        let engine = resolve_key(
            self.search.engine_id.clone(),
            "SEARCH_ENGINE_ID",
            "search.engine_id",
        )?;
        Ok((key, engine))
    }
}

fn resolve_key(
    configured: Option<String>,
    env_var: &str,
    config_key: &'static str,
) -> Result<String, ConfigError> {
    configured
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or(ConfigError::MissingKey(config_key))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing credential: set {0} in shelfscout.toml or the matching environment variable")]
    MissingKey(&'static str),
}
