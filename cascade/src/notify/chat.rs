//! Chat delivery through a Slack-compatible incoming webhook.

use super::channel::{ChannelKind, NotificationChannel};
use super::error::NotifyError;
use super::payload::NotificationPayload;
use async_trait::async_trait;
use std::time::Duration;

/// Posts formatted messages to a chat webhook URL.
#[derive(Debug)]
pub struct ChatChannel {
    webhook_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl ChatChannel {
    /// Creates a new chat channel.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
            request_timeout: Duration::from_secs(10),
        }
    }

    fn format_text(payload: &NotificationPayload) -> String {
        let mut text = format!("*[{}] {}*\n{}", payload.severity, payload.title, payload.body);
        if !payload.context.is_empty() {
            let mut keys: Vec<&String> = payload.context.keys().collect();
            keys.sort();
            for key in keys {
                text.push_str(&format!("\n• {key}: {}", payload.context[key]));
            }
        }
        text
    }
}

#[async_trait]
impl NotificationChannel for ChatChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        _recipients: &[String],
    ) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "text": Self::format_text(payload) });

        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(self.request_timeout)
            .json(&body)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Severity;

    #[test]
    fn test_format_includes_severity_and_context() {
        let payload = NotificationPayload::new("Cost alert", "Budget exceeded", Severity::Critical)
            .with_context("total_cost", serde_json::json!(10.32));

        let text = ChatChannel::format_text(&payload);
        assert!(text.contains("[critical]"));
        assert!(text.contains("Cost alert"));
        assert!(text.contains("total_cost"));
    }
}
