//! # Configuration Module
//!
//! This module defines the runtime configuration of the bot: Telegram and
//! completion API credentials, resource locations, session housekeeping and
//! the recovery settings used around completion requests.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Defaults for the completion API
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// Defaults for local storage and sessions
pub const DEFAULT_RESOURCES_DIR: &str = "resources";
pub const DEFAULT_TMP_DIR: &str = "tmp";
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 60 * 60;
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 20;

/// Recovery configuration for completion requests
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000, // 1 second
            max_retry_delay_ms: 10000, // 10 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    /// Exponential backoff for the given attempt (0-based), without jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.base_retry_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay_ms))
    }
}

/// Settings for the chat-completion backend
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound for a single HTTP request
    pub request_timeout: Duration,
    pub recovery: RecoveryConfig,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Settings for the conversation engine that do not depend on Telegram
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Root of `messages/`, `prompts/` and `images/`
    pub resources_dir: PathBuf,
    /// Where downloaded resume photos are written
    pub tmp_dir: PathBuf,
    /// TTF font for the resume PDF; builtin Helvetica when unset
    pub resume_font_path: Option<PathBuf>,
    /// Cap on remembered completion messages per chat
    pub max_history_messages: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from(DEFAULT_RESOURCES_DIR),
            tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
            resume_font_path: None,
            max_history_messages: DEFAULT_MAX_HISTORY_MESSAGES,
        }
    }
}

/// Whole-process configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    pub completion: CompletionConfig,
    pub assistant: AssistantConfig,
    pub session_idle_timeout: Duration,
    pub log_json: bool,
}

impl BotConfig {
    /// Build the configuration from environment variables
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        let telegram_bot_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;

        let mut completion = CompletionConfig::new(api_key);
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            completion.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = env::var("OPENAI_MODEL") {
            completion.model = model;
        }
        completion.max_tokens = parse_var("OPENAI_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        completion.temperature = parse_var("OPENAI_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        completion.request_timeout = Duration::from_secs(parse_var(
            "OPENAI_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        let assistant = AssistantConfig {
            resources_dir: env::var("RESOURCES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_RESOURCES_DIR)),
            tmp_dir: env::var("TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TMP_DIR)),
            resume_font_path: env::var("RESUME_FONT_PATH").ok().map(PathBuf::from),
            max_history_messages: parse_var("MAX_HISTORY_MESSAGES", DEFAULT_MAX_HISTORY_MESSAGES)?,
        };

        let session_idle_timeout = Duration::from_secs(parse_var(
            "SESSION_IDLE_TIMEOUT_SECS",
            DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
        )?);

        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            completion,
            assistant,
            session_idle_timeout,
            log_json,
        })
    }
}

/// Parse an optional environment variable, falling back to `default` when unset
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        Err(_) => Ok(default),
    }
}
