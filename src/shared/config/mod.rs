//! Application configuration module
//!
//! Provides the validated configuration shared by the offline engine, the
//! listener and the agent binary.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout for replayed mutations
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server URL
    pub server_url: Option<String>,
    /// Upper bound for a single HTTP request
    pub request_timeout: Duration,
    /// SQLite file backing the cache and the queue; `None` means
    /// `<data dir>/tasksync/local.db`
    pub database_path: Option<PathBuf>,
    /// Start a sync without asking when connectivity returns
    pub auto_confirm_sync: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            database_path: None,
            auto_confirm_sync: false,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    request_timeout: Option<Duration>,
    database_path: Option<PathBuf>,
    auto_confirm_sync: Option<bool>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: String) -> Self {
        self.server_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the database file path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Skip the user prompt before syncing
    pub fn auto_confirm_sync(mut self, enabled: bool) -> Self {
        self.auto_confirm_sync = Some(enabled);
        self
    }

    /// Overlay values from a parsed TOML file; explicit builder values win
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if self.server_url.is_none() {
            self.server_url = file.server_url.map(|url| url.trim_end_matches('/').to_string());
        }
        if self.request_timeout.is_none() {
            self.request_timeout = file.request_timeout_secs.map(Duration::from_secs);
        }
        if self.database_path.is_none() {
            self.database_path = file.database_path;
        }
        if self.auto_confirm_sync.is_none() {
            self.auto_confirm_sync = file.auto_confirm_sync;
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self.server_url,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            database_path: self.database_path,
            auto_confirm_sync: self.auto_confirm_sync.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }
}

/// On-disk configuration file layout (`tasksync.toml`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub database_path: Option<PathBuf>,
    pub auto_confirm_sync: Option<bool>,
}

impl FileConfig {
    /// Parse a TOML document
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&source)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("failed to read config file {0}")]
    Read(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}
