//! Generic JSON webhook delivery.

use super::channel::{ChannelKind, NotificationChannel};
use super::error::NotifyError;
use super::payload::NotificationPayload;
use async_trait::async_trait;
use std::time::Duration;

/// POSTs the payload verbatim to a configured URL.
#[derive(Debug)]
pub struct WebhookChannel {
    url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl WebhookChannel {
    /// Creates a new webhook channel.
    #[must_use]
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token,
            client: reqwest::Client::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        _recipients: &[String],
    ) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.request_timeout)
            .json(payload);

        if let Some(ref token) = self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::from_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Http {
                status: status.as_u16(),
            })
        }
    }
}
