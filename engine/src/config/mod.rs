//! Configuration management
//!
//! Loads and validates the Agent Desktop configuration, stored in TOML format
//! at ~/.agent_desktop/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level and loop limits
//! - **llm**: Azure OpenAI endpoint, deployment and credentials
//! - **execution**: Default command timeout
//!
//! Every section and field has a default, so a partial file (or an empty
//! one) loads. The API key may be left out of the file entirely and supplied
//! through the `AZURE_OPENAI_API_KEY` environment variable instead.
//!
//! # Examples
//!
//! ```no_run
//! use agent_desktop::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Endpoint: {}", config.llm.endpoint);
//! println!("Step limit: {}", config.max_steps());
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `llm.api_key` is not set
pub const API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Bounds for the step limit derived from the command timeout
const DERIVED_MIN_STEPS: usize = 10;
const DERIVED_MAX_STEPS: usize = 50;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Azure OpenAI settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Command execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Iteration budget per run. Derived from the command timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,

    /// Consecutive text-only responses accepted before a fresh run is
    /// considered complete
    #[serde(default = "default_max_text_responses")]
    pub max_text_responses: usize,
}

/// Azure OpenAI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    #[serde(default)]
    pub endpoint: String,

    /// Deployment name
    #[serde(default)]
    pub deployment: String,

    /// Model name, informational
    #[serde(default)]
    pub model: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// API key. Falls back to `AZURE_OPENAI_API_KEY` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Command execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Default `run_command` timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_text_responses() -> usize {
    2
}

fn default_api_version() -> String {
    "2024-10-21".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_steps: None,
            max_text_responses: default_max_text_responses(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: String::new(),
            model: String::new(),
            api_version: default_api_version(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LLMConfig {
    /// The configured API key, else the environment variable
    pub fn resolved_api_key(&self) -> Option<String> {
        self.key_or(std::env::var(API_KEY_ENV).ok())
    }

    fn key_or(&self, fallback: Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| fallback.filter(|k| !k.trim().is_empty()))
    }

    fn first_missing(&self, api_key: Option<&str>) -> Option<&'static str> {
        if api_key.is_none() {
            Some("api_key")
        } else if self.endpoint.trim().is_empty() {
            Some("endpoint")
        } else if self.deployment.trim().is_empty() {
            Some("deployment")
        } else if self.model.trim().is_empty() {
            Some("model")
        } else {
            None
        }
    }
}

impl Config {
    /// Load configuration from the default location
    /// (~/.agent_desktop/config.toml), creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file cannot be read, parsed or
    /// validated, or if the default file cannot be written.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path. A leading `~` is expanded.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let path = expand_path(path)?;
        let contents = fs::read_to_string(&path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), EngineError> {
        let path = expand_path(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))
    }

    fn create_default(path: &Path) -> Result<Self, EngineError> {
        let mut config = Self::default();
        config.validate_and_process()?;
        config.save_to_path(path)?;
        Ok(config)
    }

    /// Default configuration file path (~/.agent_desktop/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".agent_desktop").join("config.toml"))
    }

    /// True when the endpoint, deployment, model and an API key are all set
    pub fn is_configured(&self) -> bool {
        self.validate_llm().is_ok()
    }

    /// Check that every LLM field needed to make a call is present
    ///
    /// # Errors
    ///
    /// `EngineError::NotConfigured` naming the first missing field.
    pub fn validate_llm(&self) -> Result<(), EngineError> {
        let key = self.llm.resolved_api_key();
        match self.llm.first_missing(key.as_deref()) {
            Some(field) => Err(EngineError::NotConfigured(field.to_string())),
            None => Ok(()),
        }
    }

    /// Iteration budget for a run: the explicit `core.max_steps`, else a
    /// third of the command timeout clamped to 10..=50
    pub fn max_steps(&self) -> usize {
        self.core.max_steps.unwrap_or_else(|| {
            let derived = (self.execution.timeout_secs / 3) as usize;
            derived.clamp(DERIVED_MIN_STEPS, DERIVED_MAX_STEPS)
        })
    }

    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        self.core.log_level = self.core.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.core.max_steps == Some(0) {
            return Err(EngineError::Config(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.core.max_text_responses == 0 {
            return Err(EngineError::Config(
                "max_text_responses must be at least 1".to_string(),
            ));
        }
        if self.execution.timeout_secs == 0 {
            return Err(EngineError::Config(
                "execution timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.llm.endpoint = self.llm.endpoint.trim().trim_end_matches('/').to_string();

        Ok(())
    }
}

/// Expand ~ in path to the user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
