//! Notification channel — best-effort, fire-and-forget.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ChannelError;

/// Outbound notification sink for "a draft is waiting" messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), ChannelError>;
}

/// Posts notifications as JSON (`{"text": …}`) to a webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| ChannelError::NotifyFailed(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| ChannelError::NotifyFailed(e.to_string()))?;

        debug!("Notification delivered");
        Ok(())
    }
}

/// Logs notifications instead of delivering them — the default when no
/// webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        info!(message = %text, "Notification (log only)");
        Ok(())
    }
}
