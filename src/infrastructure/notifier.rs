//! Notification delivery
//!
//! `Ok(())` means the message reached the channel. Callers commit state
//! only after a successful send.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::constants::scan::MAX_MESSAGE_UTF16_UNITS;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Message of {units} UTF-16 units exceeds the limit of {max}")]
    TooLong { units: usize, max: usize },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        (**self).notify(message).await
    }
}

/// Plain-text messages through the Telegram Bot API
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        Self::with_api_base(TELEGRAM_API, token, chat_id)
    }

    /// Custom API base, e.g. a local bot API server
    pub fn with_api_base(api_base: &str, token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        })
    }
}

/// Telegram counts message length in UTF-16 code units
fn check_length(message: &str) -> Result<(), NotifyError> {
    let units = message.encode_utf16().count();
    if units > MAX_MESSAGE_UTF16_UNITS {
        return Err(NotifyError::TooLong {
            units,
            max: MAX_MESSAGE_UTF16_UNITS,
        });
    }
    Ok(())
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        check_length(message)?;
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", message),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("📨 Telegram message delivered ({} bytes)", message.len());
        Ok(())
    }
}

/// Dry-run notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!("📣 Notification (dry run):\n{}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_messages_over_the_limit() {
        assert!(check_length(&"a".repeat(MAX_MESSAGE_UTF16_UNITS)).is_ok());
        // Each emoji is a surrogate pair: under the limit in chars, over it in units.
        let emojis = "🎉".repeat(MAX_MESSAGE_UTF16_UNITS / 2 + 1);
        assert!(emojis.chars().count() < MAX_MESSAGE_UTF16_UNITS);
        assert!(matches!(
            check_length(&emojis),
            Err(NotifyError::TooLong { units, .. }) if units == MAX_MESSAGE_UTF16_UNITS + 2
        ));
    }

    #[tokio::test]
    async fn oversized_message_is_not_sent() {
        let notifier = TelegramNotifier::with_api_base("http://127.0.0.1:9", "123:abc", "42").unwrap();
        let result = notifier.notify(&"x".repeat(MAX_MESSAGE_UTF16_UNITS + 1)).await;
        assert!(matches!(result, Err(NotifyError::TooLong { .. })));
    }

    #[tokio::test]
    async fn log_notifier_always_delivers() {
        assert!(LogNotifier.notify("🎉 Back in stock!").await.is_ok());
    }

    #[tokio::test]
    async fn builds_bot_endpoint() {
        let notifier = TelegramNotifier::with_api_base("http://localhost:8081/", "123:abc", "42").unwrap();
        assert_eq!(notifier.endpoint, "http://localhost:8081/bot123:abc/sendMessage");
        assert_eq!(notifier.chat_id, "42");
    }
}
