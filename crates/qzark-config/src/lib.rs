//! qzark-config: runtime settings and task-definition loading.
//!
//! Settings come from the process environment (optionally seeded from a
//! `.env` file); the task list comes from a YAML document. Both are plain
//! inputs to the core — nothing here is consulted again after startup.

pub mod tasks;

pub use tasks::{load_tasks, parse_tasks};

use thiserror::Error;

/// Lower bound for an explicit timeout override, in seconds.
pub const MIN_TIMEOUT_SECONDS: u64 = 10;
/// Upper bound for an explicit timeout override, in seconds.
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("timeout must be between {MIN_TIMEOUT_SECONDS} and {MAX_TIMEOUT_SECONDS} seconds, got {0}")]
    TimeoutOutOfRange(u64),
    #[error("invalid value for {key}: {value}")]
    InvalidEnvValue { key: String, value: String },
}

/// Notification and runtime settings, constructed once and passed by value
/// into the components that need them.
///
/// Every channel is independently optional; a channel is enabled when all of
/// its required fields are present.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Global timeout override in seconds, when one was supplied.
    pub timeout_seconds: Option<u64>,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub discord_webhook_url: Option<String>,

    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from_email: Option<String>,
    pub smtp_to_email: Option<String>,
}

impl Settings {
    /// Load settings from the environment, reading `.env` first if present.
    ///
    /// Variables: `QZARK_TIMEOUT`, `QZARK_TELEGRAM_BOT_TOKEN`,
    /// `QZARK_TELEGRAM_CHAT_ID`, `QZARK_DISCORD_WEBHOOK_URL`,
    /// `QZARK_SMTP_SERVER`, `QZARK_SMTP_PORT`, `QZARK_SMTP_USERNAME`,
    /// `QZARK_SMTP_PASSWORD`, `QZARK_SMTP_FROM_EMAIL`, `QZARK_SMTP_TO_EMAIL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let timeout_seconds = match env_var("QZARK_TIMEOUT") {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnvValue {
                        key: "QZARK_TIMEOUT".into(),
                        value: raw.clone(),
                    })?;
                Some(validate_timeout(secs)?)
            }
            None => None,
        };

        let smtp_port = match env_var("QZARK_SMTP_PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| ConfigError::InvalidEnvValue {
                key: "QZARK_SMTP_PORT".into(),
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            timeout_seconds,
            telegram_bot_token: env_var("QZARK_TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: env_var("QZARK_TELEGRAM_CHAT_ID"),
            discord_webhook_url: env_var("QZARK_DISCORD_WEBHOOK_URL"),
            smtp_server: env_var("QZARK_SMTP_SERVER"),
            smtp_port,
            smtp_username: env_var("QZARK_SMTP_USERNAME"),
            smtp_password: env_var("QZARK_SMTP_PASSWORD"),
            smtp_from_email: env_var("QZARK_SMTP_FROM_EMAIL"),
            smtp_to_email: env_var("QZARK_SMTP_TO_EMAIL"),
        })
    }

    /// Apply an explicit timeout override (e.g. from the CLI), validating
    /// the allowed range.
    pub fn with_timeout_override(mut self, seconds: u64) -> Result<Self, ConfigError> {
        self.timeout_seconds = Some(validate_timeout(seconds)?);
        Ok(self)
    }

    pub fn telegram_enabled(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    pub fn discord_enabled(&self) -> bool {
        self.discord_webhook_url.is_some()
    }

    pub fn smtp_enabled(&self) -> bool {
        self.smtp_server.is_some() && self.smtp_from_email.is_some() && self.smtp_to_email.is_some()
    }
}

/// Validate a timeout override against the 10-300 second range.
pub fn validate_timeout(seconds: u64) -> Result<u64, ConfigError> {
    if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&seconds) {
        return Err(ConfigError::TimeoutOutOfRange(seconds));
    }
    Ok(seconds)
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
