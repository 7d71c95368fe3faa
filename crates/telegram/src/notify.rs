//! Outbound chat replies.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;

const SEND_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Network(String),
    #[error("notification rejected with status {status}")]
    Status { status: u16 },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: SecretString,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|error| NotifyError::Network(error.to_string()))?;

        Ok(Self { client, bot_token, api_base: "https://api.telegram.org".to_string() })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.bot_token.expose_secret()
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|error| NotifyError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status { status: status.as_u16() });
        }

        info!(event_name = "reply_sent", chat_id, chars = text.chars().count());
        Ok(())
    }
}
