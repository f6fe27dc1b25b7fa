//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::FetcherConfig;
use crate::parse_duration;
use crate::storage::StorageConfig;
use crate::sync::slippi::DEFAULT_ENDPOINT;
use crate::sync::SyncConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Ranking service client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlippiConfig {
    /// GraphQL gateway URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Minimum spacing between profile lookups, e.g. "1s"
    #[serde(default = "default_request_delay")]
    pub request_delay: String,

    #[serde(default = "default_timeout")]
    pub timeout: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Keep every raw response under `<data_dir>/raw`
    #[serde(default)]
    pub archive_raw: bool,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_delay() -> String {
    "1s".to_string()
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_user_agent() -> String {
    concat!("rank-tracker/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for SlippiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_delay: default_request_delay(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            archive_raw: false,
        }
    }
}

/// Reconciliation schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Hide never-played accounts from displayed leaderboards
    #[serde(default = "default_true")]
    pub hide_unplayed: bool,

    /// Cache the leaderboard after every pass
    #[serde(default)]
    pub snapshot: bool,
}

fn default_interval() -> String {
    "6h".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            hide_unplayed: true,
            snapshot: false,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub slippi: SlippiConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            slippi: SlippiConfig::default(),
            sync: SyncSettings::default(),
            server: ServerConfig::default(),
        }
    }
}

fn duration_field(name: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value)
        .ok_or_else(|| ConfigError::ValidationError(format!("{} is not a duration: {:?}", name, value)))
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.slippi.endpoint).map_err(|e| {
            ConfigError::ValidationError(format!("slippi.endpoint is not a URL: {}", e))
        })?;

        duration_field("slippi.request_delay", &self.slippi.request_delay)?;

        if duration_field("slippi.timeout", &self.slippi.timeout)?.is_zero() {
            return Err(ConfigError::ValidationError(
                "slippi.timeout must be greater than 0".to_string(),
            ));
        }

        if duration_field("sync.interval", &self.sync.interval)?.is_zero() {
            return Err(ConfigError::ValidationError(
                "sync.interval must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(self.data_dir.clone())
    }

    pub fn fetcher_config(&self) -> Result<FetcherConfig, ConfigError> {
        Ok(FetcherConfig {
            archive_dir: self.slippi.archive_raw.then(|| self.storage().raw_dir()),
            timeout: duration_field("slippi.timeout", &self.slippi.timeout)?,
            user_agent: self.slippi.user_agent.clone(),
            request_delay: duration_field("slippi.request_delay", &self.slippi.request_delay)?,
            ..Default::default()
        })
    }

    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        Ok(SyncConfig {
            interval: duration_field("sync.interval", &self.sync.interval)?,
            snapshot: self.sync.snapshot,
        })
    }
}
