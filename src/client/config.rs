use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError, FileConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Client configuration wrapper.
#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self { app: builder.build()? })
    }

    /// Read `CLIENT_API_URL`, `TASKSYNC_DB_PATH`, `TASKSYNC_TIMEOUT_SECS` and
    /// `TASKSYNC_AUTO_CONFIRM` on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::with_builder(Self::env_builder()?)
    }

    /// Load a TOML file; environment variables take precedence over it
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = FileConfig::load(path)?;
        Self::with_builder(Self::env_builder()?.merge_file(file))
    }

    fn env_builder() -> Result<AppConfigBuilder, ConfigError> {
        let mut builder = AppConfig::builder();
        if let Ok(url) = std::env::var("CLIENT_API_URL") {
            builder = builder.server_url(url);
        }
        if let Ok(path) = std::env::var("TASKSYNC_DB_PATH") {
            builder = builder.database_path(path);
        }
        if let Ok(secs) = std::env::var("TASKSYNC_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                field: "TASKSYNC_TIMEOUT_SECS",
                message: e.to_string(),
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Ok(flag) = std::env::var("TASKSYNC_AUTO_CONFIRM") {
            builder = builder.auto_confirm_sync(flag == "1" || flag.eq_ignore_ascii_case("true"));
        }
        Ok(builder)
    }

    /// Get the full URL for an API endpoint; absolute URLs pass through
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.server_url(), path)
        } else {
            format!("{}/{}", self.server_url(), path)
        }
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        self.app.request_timeout
    }

    /// Configured database file, or the platform data directory default
    pub fn database_path(&self) -> PathBuf {
        self.app.database_path.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
            path.push("tasksync");
            path.push("local.db");
            path
        })
    }

    pub fn auto_confirm_sync(&self) -> bool {
        self.app.auto_confirm_sync
    }
}
