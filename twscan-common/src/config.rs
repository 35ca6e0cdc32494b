//! Configuration management for the screener.
//!
//! The screener reads an optional JSON file at `~/.twscan/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TELEGRAM_BOT_TOKEN` → secrets.telegram.bot_token
//! - `TELEGRAM_CHAT_ID` → secrets.telegram.chat_id
//! - `TWSCAN_LOG_LEVEL` → observability.log_level
//! - `TWSCAN_LOG_FORMAT` → observability.log_format
//! - `TWSCAN_RESULT_PATH` → output.result_path
//!
//! Screening thresholds live under the `screener` key and are interpreted by
//! the screener crate itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".twscan"),
        |dirs| dirs.home_dir().join(".twscan"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
///
/// Loaded once at process start and treated as immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Credentials for collaborators
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Shared HTTP transport settings for data adapters and the notifier
    #[serde(default)]
    pub http: HttpConfig,

    /// Notification behaviour
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Result export
    #[serde(default)]
    pub output: OutputConfig,

    /// Raw screener section (thresholds), parsed by the screener crate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screener: Option<serde_json::Value>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration (explicit path or default) with environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored so a blank variable does not clear a
    /// configured credential.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.secrets.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.secrets.telegram.chat_id = Some(chat_id);
        }
        if let Some(level) = get("TWSCAN_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = get("TWSCAN_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(path) = get("TWSCAN_RESULT_PATH") {
            self.output.result_path = path;
        }
    }

    /// Telegram bot token, if configured and non-empty.
    pub fn telegram_bot_token(&self) -> Option<&str> {
        self.secrets
            .telegram
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Telegram chat id, if configured and non-empty.
    pub fn telegram_chat_id(&self) -> Option<&str> {
        self.secrets
            .telegram
            .chat_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to pin at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Grouped credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    #[serde(default)]
    pub telegram: TelegramSecrets,
}

/// Telegram bot credentials.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct TelegramSecrets {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl std::fmt::Debug for TelegramSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSecrets")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "***"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Transport settings shared by every outbound HTTP call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for the full-market snapshot, which is a large payload
    #[serde(default = "default_snapshot_timeout_secs")]
    pub snapshot_timeout_secs: u64,

    /// Total attempts per request (1 = no retry)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Linear backoff step between attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// User agent sent to the data sources
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            snapshot_timeout_secs: default_snapshot_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Publish results to Telegram. When disabled, reports go to the log.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum characters per outgoing message before splitting
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_chars: default_max_message_chars(),
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Result export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON result artifact, overwritten each run
    #[serde(default = "default_result_path")]
    pub result_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_path: default_result_path(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_snapshot_timeout_secs() -> u64 {
    30
}
fn default_retry_count() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) twscan/0.1".into()
}
fn default_max_message_chars() -> usize {
    4000 // Telegram hard limit is 4096
}
fn default_result_path() -> String {
    "scan_result.json".into()
}
