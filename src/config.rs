//! Configuration loading and management
//!
//! Handles parsing of `config.toml` in the stm data directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::storage::validate_key;
use crate::store::DEFAULT_STORAGE_KEY;

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Subtask suggestion configuration
    #[serde(default)]
    pub suggest: SuggestConfig,
}

/// Task storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key holding the serialized task collection
    #[serde(default = "default_storage_key")]
    pub key: String,

    /// How long a writer waits for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_storage_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Which service produces subtask suggestions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestProvider {
    /// Call the Gemini generateContent API directly
    #[default]
    Gemini,
    /// POST `{taskTitle, taskDescription}` to `suggest.url`
    Endpoint,
}

/// Subtask suggestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default)]
    pub provider: SuggestProvider,

    /// Gemini model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Gemini API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Suggestion endpoint URL (endpoint provider only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            provider: SuggestProvider::default(),
            model: default_model(),
            endpoint: default_endpoint(),
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a `config.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.suggest.validate()?;
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        validate_key(&self.key)
            .map_err(|err| Error::InvalidConfig(format!("storage.key: {err}")))?;
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl SuggestConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "suggest.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "suggest.api_key_env cannot be empty".to_string(),
            ));
        }
        match self.provider {
            SuggestProvider::Gemini => {
                if self.model.trim().is_empty() {
                    return Err(Error::InvalidConfig(
                        "suggest.model cannot be empty".to_string(),
                    ));
                }
                if self.endpoint.trim().is_empty() {
                    return Err(Error::InvalidConfig(
                        "suggest.endpoint cannot be empty".to_string(),
                    ));
                }
            }
            SuggestProvider::Endpoint => {
                let url = self.url.as_deref().map(str::trim).unwrap_or_default();
                if url.is_empty() {
                    return Err(Error::InvalidConfig(
                        "suggest.url is required when provider = \"endpoint\"".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Platform data directory used when `--dir` is not given
pub fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "smart-task-manager")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::OperationFailed("could not determine a home directory; pass --dir".to_string())
        })
}
