use std::time::Duration;

use crate::exporter::{ClientOptions, Timeouts};

pub const API_KEY_VAR: &str = "NEW_RELIC_APIKEY";
pub const ACCOUNT_VAR: &str = "NEW_RELIC_ACCOUNT";
pub const BASE_URL_VAR: &str = "NEW_RELIC_INSIGHTS_URL";
pub const CONNECT_TIMEOUT_VAR: &str = "NEW_RELIC_CONNECT_TIMEOUT";
pub const READ_TIMEOUT_VAR: &str = "NEW_RELIC_READ_TIMEOUT";
pub const WRITE_TIMEOUT_VAR: &str = "NEW_RELIC_WRITE_TIMEOUT";
pub const INSECURE_SKIP_VERIFY_VAR: &str = "NEW_RELIC_INSECURE_SKIP_VERIFY";
pub const REJECT_ERROR_STATUS_VAR: &str = "NEW_RELIC_REJECT_ERROR_STATUS";

pub const DEFAULT_BASE_URL: &str = "https://insights-collector.newrelic.com";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("!!! No {0} detected !!!")]
    Missing(&'static str),
    #[error("NEW_RELIC_ACCOUNT `{0}` may only contain ASCII letters, digits, `-` and `_`")]
    InvalidAccount(String),
    #[error("{var} has invalid value `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide settings, loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub account_id: String,
    pub base_url: String,
    pub timeouts: Timeouts,
    pub insecure_skip_verify: bool,
    pub reject_error_status: bool,
}
impl Config {
    pub fn new(api_key: String, account_id: String) -> Self {
        Self {
            api_key,
            account_id,
            base_url: DEFAULT_BASE_URL.into(),
            timeouts: Timeouts::default(),
            insecure_skip_verify: false,
            reject_error_status: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(var))
        };
        let api_key = required(API_KEY_VAR)?;
        let account_id = required(ACCOUNT_VAR)?;
        let valid_account = account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_account {
            return Err(ConfigError::InvalidAccount(account_id));
        }

        let mut config = Self::new(api_key, account_id);
        if let Some(base_url) = lookup(BASE_URL_VAR).filter(|v| !v.is_empty()) {
            config.base_url = base_url.trim_end_matches('/').into();
        }
        let timeout = |var: &'static str, default: Duration| match lookup(var)
            .filter(|v| !v.trim().is_empty())
        {
            Some(value) => parse_duration(var, value),
            None => Ok(default),
        };
        config.timeouts = Timeouts {
            connect: timeout(CONNECT_TIMEOUT_VAR, config.timeouts.connect)?,
            read: timeout(READ_TIMEOUT_VAR, config.timeouts.read)?,
            write: timeout(WRITE_TIMEOUT_VAR, config.timeouts.write)?,
        };
        if let Some(value) = lookup(INSECURE_SKIP_VERIFY_VAR) {
            config.insecure_skip_verify = parse_flag(INSECURE_SKIP_VERIFY_VAR, value)?;
        }
        if let Some(value) = lookup(REJECT_ERROR_STATUS_VAR) {
            config.reject_error_status = parse_flag(REJECT_ERROR_STATUS_VAR, value)?;
        }
        Ok(config)
    }

    /// Insights event ingestion URL for the configured account.
    pub fn endpoint(&self) -> String {
        format!("{}/v1/accounts/{}/events", self.base_url, self.account_id)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeouts: self.timeouts,
            insecure_skip_verify: self.insecure_skip_verify,
            reject_error_status: self.reject_error_status,
        }
    }
}

fn parse_duration(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match humantime::parse_duration(value.trim()) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be greater than zero".into(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a boolean".into(),
        }),
    }
}
