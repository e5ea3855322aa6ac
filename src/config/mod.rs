//! Configuration management for selfquery
//!
//! Loads the TOML config, applies profile and environment overrides, and
//! validates the result before anything talks to a model.

use crate::error::{Result, SelfQueryError};
use crate::query_constructor::AttributeInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub retriever: RetrieverConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn default_limit() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

/// What the documents are and which metadata the model may filter on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    pub document_contents: String,
    #[serde(default)]
    pub enable_limit: bool,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default)]
    pub attributes: Vec<AttributeInfo>,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Bundled in-memory store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_file: Option<PathBuf>,
    #[serde(default)]
    pub min_score: f32,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_limit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SelfQueryError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SelfQueryError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file, stamping `last_modified`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.meta.last_modified = current_timestamp();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SelfQueryError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| SelfQueryError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(provider) = overrides.provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(enable_limit) = overrides.enable_limit {
            self.retriever.enable_limit = enable_limit;
        }
        if let Some(default_limit) = overrides.default_limit {
            self.retriever.default_limit = default_limit;
        }

        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SELFQUERY_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("SELFQUERY_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__PROVIDER" => {
                self.llm.provider = value.to_string();
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__BASE_URL" => {
                self.llm.base_url = Some(value.to_string());
            }
            "RETRIEVER__ENABLE_LIMIT" => {
                self.retriever.enable_limit =
                    value.parse().map_err(|_| SelfQueryError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            "RETRIEVER__DEFAULT_LIMIT" => {
                self.retriever.default_limit =
                    value.parse().map_err(|_| SelfQueryError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "STORE__DOCUMENTS_FILE" => {
                self.store.documents_file = Some(PathBuf::from(value));
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            SelfQueryError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("selfquery").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            retriever: RetrieverConfig {
                document_contents: "Brief summary of a movie".to_string(),
                enable_limit: false,
                default_limit: default_limit(),
                attributes: vec![
                    AttributeInfo::new("genre", "The genre of the movie", "string"),
                    AttributeInfo::new("year", "The year the movie was released", "integer"),
                    AttributeInfo::new("director", "The name of the movie director", "string"),
                    AttributeInfo::new("rating", "A 1-10 rating for the movie", "float"),
                ],
            },
            llm: LlmConfig {
                provider: "openai".to_string(),
                base_url: None,
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                max_tokens: None,
                timeout_secs: default_timeout_secs(),
            },
            store: StoreConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
