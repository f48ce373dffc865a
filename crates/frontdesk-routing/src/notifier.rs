//! Webhook notification for outbound agent messages.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use frontdesk_core::config::WebhookConfig;
use frontdesk_core::error::FrontdeskError;
use frontdesk_core::events::WebhookEvent;

use crate::error::NotificationError;

/// Posts events to an external listener.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn post(&self, event: &WebhookEvent) -> Result<(), NotificationError>;
}

/// Used when no webhook URL is configured.
pub struct NoopNotifier;

#[async_trait]
impl WebhookNotifier for NoopNotifier {
    async fn post(&self, _event: &WebhookEvent) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// JSON-over-HTTP webhook client.
pub struct HttpWebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl HttpWebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        secret: Option<String>,
    ) -> Result<Self, FrontdeskError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FrontdeskError::Config(format!("failed to build webhook client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            secret,
        })
    }

    /// Build from config; `None` when no URL is set.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>, FrontdeskError> {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(Some(Self::new(
                url,
                Duration::from_millis(config.timeout_ms),
                config.secret.clone(),
            )?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    async fn post(&self, event: &WebhookEvent) -> Result<(), NotificationError> {
        let mut request = self.client.post(&self.url).json(event);
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!(url = %self.url, status = status.as_u16(), "Webhook delivered");
        Ok(())
    }
}
