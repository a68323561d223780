//! Channel trait and declarative channel configuration.

use super::error::NotifyError;
use super::payload::NotificationPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of delivery channel cascade knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Email via an HTTP email API.
    Email,
    /// Chat webhook (Slack-compatible).
    Chat,
    /// Generic JSON webhook.
    Webhook,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Chat => write!(f, "chat"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

/// Trait for delivery channel adapters.
#[async_trait]
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// The kind of channel this adapter implements.
    fn kind(&self) -> ChannelKind;

    /// Delivers one payload.
    ///
    /// `recipients` carries resolved email addresses; adapters that deliver
    /// to a fixed endpoint ignore it.
    async fn send(
        &self,
        payload: &NotificationPayload,
        recipients: &[String],
    ) -> Result<(), NotifyError>;
}

/// Declarative per-tenant channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Email API endpoint with bearer auth.
    Email {
        /// The email API endpoint URL.
        endpoint: String,
        /// Bearer token for the API.
        api_token: String,
        /// Sender address.
        from: String,
    },
    /// Chat webhook URL.
    Chat {
        /// The incoming-webhook URL.
        webhook_url: String,
    },
    /// Generic webhook.
    Webhook {
        /// The destination URL.
        url: String,
        /// Optional bearer token sent with each delivery.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_token: Option<String>,
    },
}

impl ChannelConfig {
    /// Returns the channel kind this config describes.
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Email { .. } => ChannelKind::Email,
            Self::Chat { .. } => ChannelKind::Chat,
            Self::Webhook { .. } => ChannelKind::Webhook,
        }
    }

    /// Validates the config before an adapter is built from it.
    pub fn validate(&self) -> Result<(), NotifyError> {
        let url = match self {
            Self::Email { endpoint, from, .. } => {
                if from.trim().is_empty() {
                    return Err(NotifyError::InvalidConfig(
                        "email sender address is empty".to_string(),
                    ));
                }
                endpoint
            }
            Self::Chat { webhook_url } => webhook_url,
            Self::Webhook { url, .. } => url,
        };

        if url.trim().is_empty() {
            return Err(NotifyError::InvalidConfig(format!(
                "{} channel URL is empty",
                self.kind()
            )));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(NotifyError::InvalidConfig(format!(
                "{} channel URL must be http(s): {url}",
                self.kind()
            )));
        }
        Ok(())
    }
}
