//! Environment configuration.

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PROVIDER: &str = "local";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONTEXT_LINES: usize = 5;
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub provider: String,
    pub command: Option<String>,
    pub query_timeout: Duration,
    pub context_lines: usize,
    pub archive_retention: Option<Duration>,
    pub log_filter: String,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = env_number::<u64>("RUBBER_DUCK_TIMEOUT_SEC", "a positive integer")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RUBBER_DUCK_TIMEOUT_SEC",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }

        let retention_days =
            env_number::<u64>("RUBBER_DUCK_ARCHIVE_RETENTION_DAYS", "a whole number of days")?;

        Ok(Self {
            provider: env_string_opt("RUBBER_DUCK_PROVIDER")
                .map(|value| value.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            command: env_string_opt("RUBBER_DUCK_COMMAND"),
            query_timeout: Duration::from_secs(timeout_secs),
            context_lines: env_number("RUBBER_DUCK_CONTEXT_LINES", "a whole number")?
                .unwrap_or(DEFAULT_CONTEXT_LINES),
            archive_retention: retention_days
                .map(|days| Duration::from_secs(days.saturating_mul(24 * 60 * 60))),
            log_filter: env_string_opt("RUBBER_DUCK_LOG")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_number<T: std::str::FromStr>(
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = env_string_opt(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value,
            expected,
        })
}
