use std::path::PathBuf;

use crate::{Error, Result};

const DEFAULT_USER_AGENT: &str = "InsiderBot/0.1 (contact: ops@example.com)";

/// Process configuration loaded from environment variables at startup.
///
/// Secrets for the messaging endpoint are not read here; the Telegram sink
/// reads them itself when it is constructed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the YAML schedule and strategy settings file.
    pub schedule_config_path: PathBuf,
    /// Root directory for per-strategy output tables.
    pub data_dir: PathBuf,
    /// Directory for cached listing files (EDGAR daily indexes).
    pub cache_dir: PathBuf,
    /// SEC requires a descriptive User-Agent with contact details.
    pub sec_user_agent: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads `.env` if present. Every variable has a default.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let sec_user_agent =
            optional_env("SEC_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        if sec_user_agent.trim().is_empty() {
            return Err(Error::Config("SEC_USER_AGENT must not be blank".into()));
        }

        Ok(Config {
            schedule_config_path: optional_env("SCHEDULE_CONFIG_PATH")
                .unwrap_or_else(|| "config/schedule.yaml".to_string())
                .into(),
            data_dir: optional_env("DATA_DIR")
                .unwrap_or_else(|| "data".to_string())
                .into(),
            cache_dir: optional_env("CACHE_DIR")
                .unwrap_or_else(|| ".cache".to_string())
                .into(),
            sec_user_agent,
        })
    }
}

/// Read a variable that must be present and non-empty.
pub fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))),
    }
}

pub fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_env_reports_the_missing_key() {
        let err = required_env("INSIDERBOT_TEST_SURELY_UNSET").unwrap_err();
        assert!(err.to_string().contains("INSIDERBOT_TEST_SURELY_UNSET"));
    }
}
