//! Server configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot credential
    pub bot_token: String,
    /// Telegram Bot API base URL
    pub telegram_api_url: String,

    /// sqlite connection URL
    pub database_url: String,
    /// Directory holding the reference JSON tables
    pub content_dir: PathBuf,
    /// Where restart snapshots are archived
    pub backup_dir: PathBuf,

    pub autosave_interval: Duration,
    pub save_debounce: Duration,
    pub defeat_rest: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a whole number of seconds", key)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            bot_token: var("BOT_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .context("BOT_TOKEN environment variable is required")?,
            telegram_api_url: var("TELEGRAM_API_URL").unwrap_or_else(|| "https://api.telegram.org".to_string()),

            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://game.db".to_string()),
            content_dir: var("CONTENT_DIR").unwrap_or_else(|| "data".to_string()).into(),
            backup_dir: var("BACKUP_DIR").unwrap_or_else(|| "backups".to_string()).into(),

            autosave_interval: secs("AUTOSAVE_INTERVAL_SECS", 300)?,
            save_debounce: secs("SAVE_DEBOUNCE_SECS", 30)?,
            defeat_rest: secs("DEFEAT_REST_SECS", 15)?,
        })
    }
}
