use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

pub const COLOR_WIN: u32 = 3066993;
pub const COLOR_LOSS: u32 = 15158332;
pub const COLOR_NEUTRAL: u32 = 9807270;
pub const COLOR_SESSION: u32 = 3447003;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebhookMessage {
    pub content: String,
    pub tts:     bool,
    pub embeds:  Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    pub title:  String,
    pub color:  u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name:   String,
    pub value:  String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self { name: name.into(), value: value.into(), inline }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(u16),

    #[error("failed to encode webhook message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Where finished messages go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, message: &WebhookMessage) -> Result<(), DeliveryError>;
}

/// Posts messages to a Discord webhook URL. One attempt per message.
pub struct WebhookClient {
    client: reqwest::Client,
    url:    String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl NotificationSink for WebhookClient {
    async fn deliver(&self, message: &WebhookMessage) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(message).map_err(DeliveryError::Encode)?;
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Prints messages to the log instead of sending them. Used when no webhook
/// URL is configured.
#[derive(Debug, Default)]
pub struct DryRunSink;

#[async_trait]
impl NotificationSink for DryRunSink {
    async fn deliver(&self, message: &WebhookMessage) -> Result<(), DeliveryError> {
        let body = serde_json::to_string_pretty(message).map_err(DeliveryError::Encode)?;
        info!("Notifier: [dry-run] {}\n{}", message.content, body);
        Ok(())
    }
}
