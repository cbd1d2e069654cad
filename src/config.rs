use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_ML_BASE_URL: &str = "http://localhost:5001";
pub const DEFAULT_ML_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_DB_STATEMENT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub ml: Option<MlSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSection {
    /// Postgres connection string holding the `surfer_entries` table
    pub url: String,
    pub connect_timeout_secs: Option<u64>,
    /// Upper bound for the baseline query (default: 5000)
    pub statement_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MlSection {
    /// Base URL of the prediction service; `/predict` and `/health` are appended
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the database URL, or `None` if not configured or empty.
    pub fn database_url(&self) -> Option<&str> {
        let url = self.database.as_ref()?.url.as_str();
        if url.trim().is_empty() { None } else { Some(url) }
    }

    pub fn database_connect_timeout(&self) -> Duration {
        let secs = self
            .database
            .as_ref()
            .and_then(|d| d.connect_timeout_secs)
            .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn database_statement_timeout(&self) -> Duration {
        let millis = self
            .database
            .as_ref()
            .and_then(|d| d.statement_timeout_ms)
            .unwrap_or(DEFAULT_DB_STATEMENT_TIMEOUT_MS);
        Duration::from_millis(millis)
    }

    pub fn ml_base_url(&self) -> &str {
        self.ml
            .as_ref()
            .and_then(|m| m.base_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_ML_BASE_URL)
    }

    pub fn ml_timeout(&self) -> Duration {
        let secs = self
            .ml
            .as_ref()
            .and_then(|m| m.timeout_secs)
            .unwrap_or(DEFAULT_ML_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }
}
