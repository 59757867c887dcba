//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the API bearer token.
pub const ENV_API_TOKEN: &str = "COC_API_TOKEN";
/// Environment variable holding the clan tag.
pub const ENV_CLAN_TAG: &str = "COC_CLAN_TAG";
/// Environment variable holding the notification webhook URL.
pub const ENV_WEBHOOK_URL: &str = "WAR_TRACKER_WEBHOOK_URL";

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

/// War API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token presented on every request
    #[serde(default)]
    pub token: String,

    /// Clan tag, with or without the leading '#'
    #[serde(default)]
    pub clan_tag: String,

    /// Timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.clashofclans.com/v1".to_string()
}

fn default_api_timeout() -> u64 {
    8
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            clan_tag: String::new(),
            timeout_seconds: default_api_timeout(),
        }
    }
}

/// Webhook notification configuration. No URL disables notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notify_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_footer")]
    pub footer: String,
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_footer() -> String {
    "War Tracker".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: default_notify_timeout(),
            footer: default_footer(),
        }
    }
}

/// How the roster counts wars participated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationCounting {
    /// Once per war with at least one attack
    #[default]
    PerWar,
    /// Once per attack row
    PerAttack,
}

/// Leaderboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Attacks each member is expected to make per war
    #[serde(default = "default_expected_attacks")]
    pub expected_attacks_per_war: u32,

    /// Trailing windows in days; an all-time board is always produced
    #[serde(default = "default_windows")]
    pub windows: Vec<u32>,

    #[serde(default)]
    pub participation: ParticipationCounting,

    /// Directory for exported JSON files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Base filename; the window suffix goes before the extension
    #[serde(default = "default_file_stem")]
    pub file_stem: String,
}

fn default_expected_attacks() -> u32 {
    2
}

fn default_windows() -> Vec<u32> {
    vec![7, 30, 90]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_stem() -> String {
    "leaderboard".to_string()
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            expected_attacks_per_war: default_expected_attacks(),
            windows: default_windows(),
            participation: ParticipationCounting::default(),
            output_dir: default_output_dir(),
            file_stem: default_file_stem(),
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

    /// Carry loot-hit markings across re-fetches of the same war
    #[serde(default = "default_preserve_loot")]
    pub preserve_loot_markings: bool,

    /// Age in seconds after which a leftover store lock is taken over
    #[serde(default = "default_lock_stale")]
    pub lock_stale_seconds: u64,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_preserve_loot() -> bool {
    true
}

fn default_lock_stale() -> u64 {
    600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            preserve_loot_markings: default_preserve_loot(),
            lock_stale_seconds: default_lock_stale(),
            api: ApiConfig::default(),
            notify: NotifyConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults, then
    /// apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override credentials and endpoints from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api.token = token;
        }
        if let Some(tag) = lookup(ENV_CLAN_TAG).filter(|v| !v.is_empty()) {
            self.api.clan_tag = tag;
        }
        if let Some(url) = lookup(ENV_WEBHOOK_URL).filter(|v| !v.is_empty()) {
            self.notify.webhook_url = Some(url);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "API timeout must be greater than 0".to_string(),
            ));
        }

        if self.leaderboard.expected_attacks_per_war == 0 {
            return Err(ConfigError::ValidationError(
                "Expected attacks per war must be greater than 0".to_string(),
            ));
        }

        if self.leaderboard.windows.contains(&0) {
            return Err(ConfigError::ValidationError(
                "Leaderboard windows must be at least one day".to_string(),
            ));
        }

        Ok(())
    }

    /// Credentials are only needed when actually fetching.
    pub fn validate_for_fetch(&self) -> Result<(), ConfigError> {
        if self.api.token.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "API token missing (set api.token or {})",
                ENV_API_TOKEN
            )));
        }

        if self.api.clan_tag.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Clan tag missing (set api.clan_tag or {})",
                ENV_CLAN_TAG
            )));
        }

        Ok(())
    }
}
