//! Notification module for publishing scan reports.
//!
//! Sends report text to Telegram through the Bot API, or to the log in
//! dry-run mode. Long texts are split into chunks below the API limit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use twscan_common::config::{Config, HttpConfig};
use twscan_common::util::split_message;
use twscan_common::Error;

use crate::data::HttpFetcher;

/// Telegram Bot API base URL
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Destination for report text.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the notifier name (e.g., "telegram")
    fn name(&self) -> &'static str;

    /// Publish `text`, splitting it as needed.
    async fn publish(&self, text: &str) -> Result<()>;
}

// ============================================================================
// Telegram
// ============================================================================

/// Request body for `sendMessage`
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Response envelope of the Bot API
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Notifier posting to a Telegram chat.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    max_message_chars: usize,
    api_base: String,
    http: HttpFetcher,
}

impl TelegramNotifier {
    pub fn new(
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        http: &HttpConfig,
        max_message_chars: usize,
    ) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            max_message_chars,
            api_base: TELEGRAM_API_BASE.to_string(),
            http: HttpFetcher::new(http),
        }
    }

    /// Use another Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Create from config; both credentials are required.
    pub fn from_config(config: &Config) -> twscan_common::Result<Self> {
        let token = config
            .telegram_bot_token()
            .ok_or_else(|| Error::MissingCredential("TELEGRAM_BOT_TOKEN".into()))?;
        let chat_id = config
            .telegram_chat_id()
            .ok_or_else(|| Error::MissingCredential("TELEGRAM_CHAT_ID".into()))?;

        Ok(Self::new(
            token,
            chat_id,
            &config.http,
            config.notification.max_message_chars,
        ))
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn send_chunk(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response: TelegramResponse = self
            .http
            .post_json(&self.send_url(), &request)
            .await
            .context("Telegram sendMessage failed")?;

        if !response.ok {
            anyhow::bail!(
                "Telegram rejected message: {}",
                response.description.unwrap_or_else(|| "Unknown error".to_string())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn publish(&self, text: &str) -> Result<()> {
        let chunks = split_message(text, self.max_message_chars);
        let total = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            self.send_chunk(chunk)
                .await
                .with_context(|| format!("chunk {}/{}", i + 1, total))?;
        }

        tracing::info!(chunks = total, chars = text.chars().count(), "Telegram message sent");
        Ok(())
    }
}

// ============================================================================
// Log (dry run)
// ============================================================================

/// Notifier that writes the report to the log instead of sending it.
pub struct LogNotifier {
    max_message_chars: usize,
}

impl LogNotifier {
    pub fn new(max_message_chars: usize) -> Self {
        Self { max_message_chars }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(4000)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, text: &str) -> Result<()> {
        let chunks = split_message(text, self.max_message_chars);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::info!(chunk = i + 1, total, "Dry run message:\n{}", chunk);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_serialization() {
        let request = SendMessageRequest {
            chat_id: "-100123",
            text: "hello",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], "-100123");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["disable_web_page_preview"], true);
    }

    #[test]
    fn test_response_parsing() {
        let ok: TelegramResponse = serde_json::from_str(r#"{"ok":true,"result":{}}"#).unwrap();
        assert!(ok.ok);

        let err: TelegramResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"chat not found"}"#)
                .unwrap();
        assert!(!err.ok);
        assert_eq!(err.description.as_deref(), Some("chat not found"));
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = Config::default();
        let err = TelegramNotifier::from_config(&config).err().unwrap();
        assert!(err.is_configuration());

        let mut config = Config::default();
        config.secrets.telegram.bot_token = Some("123:abc".into());
        config.secrets.telegram.chat_id = Some("-100123".into());
        let notifier = TelegramNotifier::from_config(&config).unwrap();
        assert_eq!(notifier.name(), "telegram");
        assert!(notifier.send_url().ends_with("/bot123:abc/sendMessage"));
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_long_text() {
        let notifier = LogNotifier::new(10);
        let text = "line one\nline two\nline three";
        assert!(notifier.publish(text).await.is_ok());
    }
}
