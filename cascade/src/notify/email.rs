//! Email delivery through an HTTP email API.

use super::channel::{ChannelKind, NotificationChannel};
use super::error::NotifyError;
use super::payload::NotificationPayload;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Body posted to the email API.
#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
    severity: String,
}

/// Sends mail by POSTing to an email-API endpoint with bearer auth.
#[derive(Debug)]
pub struct EmailChannel {
    endpoint: String,
    api_token: String,
    from: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl EmailChannel {
    /// Creates a new email channel.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        api_token: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            from: from.into(),
            client: reqwest::Client::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "no recipients resolved for email delivery".to_string(),
            ));
        }

        let request = EmailRequest {
            from: &self.from,
            to: recipients,
            subject: &payload.title,
            body: &payload.body,
            severity: payload.severity.to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.request_timeout)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&request)
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
