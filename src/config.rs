//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default hard timeout for a single completion call.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Default spool poll interval.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Application configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub db_path: PathBuf,
    pub inbox_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub drafts_dir: PathBuf,
    /// From address used on draft replies.
    pub from_address: String,
    /// Optional webhook for reviewer notifications.
    pub notify_webhook: Option<String>,
    pub poll_interval: Duration,
}

impl AppConfig {
    /// Build config from environment variables.
    ///
    /// Only the provider API key is required, and only for non-mock
    /// backends; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend: LlmBackend = var_or("OTTOMAIL_LLM_PROVIDER", "mock")
            .parse()
            .map_err(|message| ConfigError::InvalidValue {
                key: "OTTOMAIL_LLM_PROVIDER".to_string(),
                message,
            })?;

        let api_key = match backend {
            LlmBackend::Anthropic => required_secret("ANTHROPIC_API_KEY")?,
            LlmBackend::OpenAi => required_secret("OPENAI_API_KEY")?,
            LlmBackend::Mock => SecretString::from(""),
        };

        let model = var_or("OTTOMAIL_MODEL", backend.default_model());

        let request_timeout = Duration::from_secs(parse_var(
            "OTTOMAIL_LLM_TIMEOUT_SECS",
            DEFAULT_LLM_TIMEOUT_SECS,
        )?);
        let poll_interval = Duration::from_secs(parse_var(
            "OTTOMAIL_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?);

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key,
                model,
                request_timeout,
            },
            db_path: var_or("OTTOMAIL_DB_PATH", "./data/ottomail.db").into(),
            inbox_dir: var_or("OTTOMAIL_INBOX_DIR", "./data/inbox").into(),
            processed_dir: var_or("OTTOMAIL_PROCESSED_DIR", "./data/processed").into(),
            drafts_dir: var_or("OTTOMAIL_DRAFTS_DIR", "./data/drafts").into(),
            from_address: var_or("OTTOMAIL_FROM_ADDRESS", "proposals@ottomail.dev"),
            notify_webhook: std::env::var("OTTOMAIL_NOTIFY_WEBHOOK")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            poll_interval,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required_secret(key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(key)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_var(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got '{raw}'"),
        }),
    }
}
