//! Config file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::OpenRequestError;

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "OPENREQUEST_API_URL";

/// Remote CRUD API settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Request executor settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Network dispatch timeout
    pub timeout_secs: u64,
    /// Wall-clock limit for one script run
    pub script_timeout_ms: u64,
    pub script_memory_limit_mb: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            script_timeout_ms: 5000,
            script_memory_limit_mb: 64,
        }
    }
}

/// Local schedule storage settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
    /// Prefix of every storage key
    pub namespace: String,
    /// Execution history cap
    pub max_executions: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: dirs::data_dir()
                .map(|p| p.join("openrequest"))
                .unwrap_or_else(|| PathBuf::from(".openrequest")),
            namespace: "open_request_api_".to_string(),
            max_executions: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// openrequest configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub executor: ExecutorConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default config file (TOML format).
    ///
    /// A missing file gives the defaults. `OPENREQUEST_API_URL` overrides
    /// the API base URL either way.
    pub fn load() -> Result<Self, OpenRequestError> {
        let mut config = Self::load_from(&Self::default_config_file())?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url;
            }
        }
        Ok(config)
    }

    /// Load configuration from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self, OpenRequestError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| OpenRequestError::Config(format!("Failed to read config: {}", e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, OpenRequestError> {
        toml::from_str(content)
            .map_err(|e| OpenRequestError::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Get the default config directory
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("openrequest"))
            .unwrap_or_else(|| PathBuf::from(".openrequest"))
    }

    pub fn default_config_file() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }
}
