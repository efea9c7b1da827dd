//! LessonBell configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LessonBellError, Result};

/// Environment variable that overrides `security.secret_key`.
pub const SECRET_KEY_ENV: &str = "LESSONBELL_SECRET_KEY";

/// Environment variable that overrides `telegram.bot_token`.
pub const BOT_TOKEN_ENV: &str = "LESSONBELL_BOT_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonBellConfig {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl LessonBellConfig {
    /// Load config from the default path (~/.lessonbell/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LessonBellError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LessonBellError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to a path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LessonBellError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `LESSONBELL_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(SECRET_KEY_ENV)
            && !key.is_empty()
        {
            self.security.secret_key = key;
        }
        if let Ok(token) = std::env::var(BOT_TOKEN_ENV)
            && !token.is_empty()
        {
            self.telegram.bot_token = token;
        }
        self
    }

    /// Checks required before the bot and tracker can run.
    pub fn validate_for_run(&self) -> Result<()> {
        if self.security.secret_key.is_empty() {
            return Err(LessonBellError::Config(format!(
                "security.secret_key is empty (set it in the config or {SECRET_KEY_ENV})"
            )));
        }
        if self.telegram.bot_token.is_empty() {
            return Err(LessonBellError::Config(format!(
                "telegram.bot_token is empty (set it in the config or {BOT_TOKEN_ENV})"
            )));
        }
        if self.telegram.admin_chat_id == 0 {
            return Err(LessonBellError::Config("telegram.admin_chat_id is not set".into()));
        }
        if self.timer.second_alert_secs >= self.timer.first_alert_secs {
            return Err(LessonBellError::Config(
                "timer.second_alert_secs must be smaller than timer.first_alert_secs".into(),
            ));
        }
        if self.timer.poll_interval_secs == 0 {
            return Err(LessonBellError::Config("timer.poll_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the LessonBell home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lessonbell")
    }
}

/// Message language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: String,
    /// Chat id of the single admin; every other sender is ignored.
    #[serde(default)]
    pub admin_chat_id: i64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 { 1 }

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_chat_id: 0,
            poll_interval: default_poll_interval(),
        }
    }
}

/// Lesson tracker timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_first_alert")]
    pub first_alert_secs: u64,
    #[serde(default = "default_second_alert")]
    pub second_alert_secs: u64,
    /// Idle re-poll interval and the upper bound of one wait tick.
    #[serde(default = "default_timer_poll")]
    pub poll_interval_secs: u64,
    /// Upper bound for one notification delivery attempt.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_first_alert() -> u64 { 600 }
fn default_second_alert() -> u64 { 120 }
fn default_timer_poll() -> u64 { 10 }
fn default_send_timeout() -> u64 { 10 }

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            first_alert_secs: default_first_alert(),
            second_alert_secs: default_second_alert(),
            poll_interval_secs: default_timer_poll(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Key material for acknowledgment tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub secret_key: String,
}

/// Schedule store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.lessonbell/lessonbell.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}
