//! Tenant-scoped channel registry with parallel fan-out.

use super::channel::{ChannelConfig, ChannelKind, NotificationChannel};
use super::chat::ChatChannel;
use super::email::EmailChannel;
use super::error::NotifyError;
use super::payload::NotificationPayload;
use super::webhook::WebhookChannel;
use crate::classify::RetryPolicy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-channel outcome of one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// The channel attempted.
    pub channel: ChannelKind,
    /// Whether delivery succeeded.
    pub success: bool,
    /// How many attempts were made.
    pub attempts: u32,
    /// The final error, when delivery failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cache of `(tenant, channel kind) → adapter`, shared by the alert engine.
///
/// Constructed once at process start and passed by reference; reads are
/// concurrent, configuration writes are exclusive. Dispatching to several
/// channels runs them in parallel so total latency is bounded by the slowest
/// channel, not the sum.
pub struct ProviderRegistry {
    channels: RwLock<HashMap<(String, ChannelKind), Arc<dyn NotificationChannel>>>,
    retry: RetryPolicy,
}

impl ProviderRegistry {
    /// Creates a registry with the default retry policy
    /// (3 attempts, 1s base delay, 30s cap).
    #[must_use]
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    /// Creates a registry with a custom retry policy.
    #[must_use]
    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            retry,
        }
    }

    /// Builds and caches adapters for a tenant from declarative configs.
    ///
    /// Replaces any previously cached adapter of the same kind. Invalid
    /// configs are rejected before anything is cached.
    pub fn configure_tenant(
        &self,
        tenant_id: &str,
        configs: &[ChannelConfig],
    ) -> Result<(), NotifyError> {
        for config in configs {
            config.validate()?;
        }

        let mut channels = self.channels.write();
        for config in configs {
            let adapter: Arc<dyn NotificationChannel> = match config {
                ChannelConfig::Email {
                    endpoint,
                    api_token,
                    from,
                } => Arc::new(EmailChannel::new(
                    endpoint.clone(),
                    api_token.clone(),
                    from.clone(),
                )),
                ChannelConfig::Chat { webhook_url } => {
                    Arc::new(ChatChannel::new(webhook_url.clone()))
                }
                ChannelConfig::Webhook { url, auth_token } => {
                    Arc::new(WebhookChannel::new(url.clone(), auth_token.clone()))
                }
            };
            channels.insert((tenant_id.to_string(), config.kind()), adapter);
        }
        Ok(())
    }

    /// Caches a prebuilt adapter for a tenant.
    pub fn register_channel(&self, tenant_id: &str, channel: Arc<dyn NotificationChannel>) {
        self.channels
            .write()
            .insert((tenant_id.to_string(), channel.kind()), channel);
    }

    /// Returns a tenant's adapter for a kind, if configured.
    #[must_use]
    pub fn channel(
        &self,
        tenant_id: &str,
        kind: ChannelKind,
    ) -> Option<Arc<dyn NotificationChannel>> {
        self.channels
            .read()
            .get(&(tenant_id.to_string(), kind))
            .cloned()
    }

    /// Delivers one payload to every requested channel, in parallel.
    ///
    /// Each send retries on transient errors under the registry policy. A
    /// failing channel never prevents delivery on the others; the report
    /// carries every channel's outcome.
    pub async fn dispatch(
        &self,
        tenant_id: &str,
        kinds: &[ChannelKind],
        payload: &NotificationPayload,
        recipients: &[String],
    ) -> Vec<DeliveryReport> {
        let sends = kinds.iter().map(|kind| {
            let channel = self.channel(tenant_id, *kind);
            let retry = self.retry;
            async move {
                match channel {
                    Some(channel) => send_with_retry(&*channel, payload, recipients, retry).await,
                    None => DeliveryReport {
                        channel: *kind,
                        success: false,
                        attempts: 0,
                        error: Some(format!("no {kind} channel configured for tenant")),
                    },
                }
            }
        });

        futures::future::join_all(sends).await
    }

    /// Drops every cached adapter, closing their HTTP sessions.
    pub fn shutdown(&self) {
        self.channels.write().clear();
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("cached_channels", &self.channels.read().len())
            .field("retry", &self.retry)
            .finish()
    }
}

async fn send_with_retry(
    channel: &dyn NotificationChannel,
    payload: &NotificationPayload,
    recipients: &[String],
    retry: RetryPolicy,
) -> DeliveryReport {
    let kind = channel.kind();
    let mut attempt: u32 = 1;

    loop {
        match channel.send(payload, recipients).await {
            Ok(()) => {
                debug!(channel = %kind, attempts = attempt, "Notification delivered");
                return DeliveryReport {
                    channel: kind,
                    success: true,
                    attempts: attempt,
                    error: None,
                };
            }
            Err(e) => {
                if e.is_retryable() && attempt < retry.max_attempts {
                    let delay = retry.delay(attempt);
                    warn!(
                        channel = %kind,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                warn!(channel = %kind, attempts = attempt, error = %e, "Delivery failed");
                return DeliveryReport {
                    channel: kind,
                    success: false,
                    attempts: attempt,
                    error: Some(e.to_string()),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Severity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    /// Fails with a configurable error a fixed number of times, then succeeds.
    #[derive(Debug)]
    struct FlakyChannel {
        kind: ChannelKind,
        failures: u32,
        retryable: bool,
        calls: AtomicU32,
    }

    impl FlakyChannel {
        fn new(kind: ChannelKind, failures: u32, retryable: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                failures,
                retryable,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl NotificationChannel for FlakyChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(
            &self,
            _payload: &NotificationPayload,
            _recipients: &[String],
        ) -> Result<(), NotifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.retryable {
                    Err(NotifyError::Http { status: 503 })
                } else {
                    Err(NotifyError::Http { status: 400 })
                }
            } else {
                Ok(())
            }
        }
    }

    /// Succeeds after a fixed delay.
    #[derive(Debug)]
    struct SlowChannel {
        kind: ChannelKind,
        delay: Duration,
    }

    #[async_trait]
    impl NotificationChannel for SlowChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(
            &self,
            _payload: &NotificationPayload,
            _recipients: &[String],
        ) -> Result<(), NotifyError> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload::new("t", "b", Severity::Info)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, 1, 10)
    }

    #[tokio::test]
    async fn test_configure_tenant_builds_adapters() {
        let registry = ProviderRegistry::new();
        registry
            .configure_tenant(
                "tenant-1",
                &[
                    ChannelConfig::Chat {
                        webhook_url: "https://chat.example.com/hook".to_string(),
                    },
                    ChannelConfig::Webhook {
                        url: "https://example.com/hook".to_string(),
                        auth_token: None,
                    },
                ],
            )
            .unwrap();

        assert!(registry.channel("tenant-1", ChannelKind::Chat).is_some());
        assert!(registry.channel("tenant-1", ChannelKind::Webhook).is_some());
        assert!(registry.channel("tenant-1", ChannelKind::Email).is_none());
        assert!(registry.channel("tenant-2", ChannelKind::Chat).is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_caching() {
        let registry = ProviderRegistry::new();
        let result = registry.configure_tenant(
            "tenant-1",
            &[
                ChannelConfig::Chat {
                    webhook_url: "https://ok.example.com".to_string(),
                },
                ChannelConfig::Webhook {
                    url: String::new(),
                    auth_token: None,
                },
            ],
        );

        assert!(result.is_err());
        assert!(registry.channel("tenant-1", ChannelKind::Chat).is_none());
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let registry = ProviderRegistry::with_retry(fast_retry());
        let flaky = FlakyChannel::new(ChannelKind::Webhook, 2, true);
        registry.register_channel("t", flaky.clone());

        let reports = registry
            .dispatch("t", &[ChannelKind::Webhook], &payload(), &[])
            .await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].success);
        assert_eq!(reports[0].attempts, 3);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let registry = ProviderRegistry::with_retry(fast_retry());
        let flaky = FlakyChannel::new(ChannelKind::Webhook, 5, false);
        registry.register_channel("t", flaky.clone());

        let reports = registry
            .dispatch("t", &[ChannelKind::Webhook], &payload(), &[])
            .await;

        assert!(!reports[0].success);
        assert_eq!(reports[0].attempts, 1);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_isolation() {
        let registry = ProviderRegistry::with_retry(fast_retry());
        registry.register_channel("t", FlakyChannel::new(ChannelKind::Chat, 100, false));
        registry.register_channel("t", FlakyChannel::new(ChannelKind::Webhook, 0, true));

        let reports = registry
            .dispatch("t", &[ChannelKind::Chat, ChannelKind::Webhook], &payload(), &[])
            .await;

        let chat = reports.iter().find(|r| r.channel == ChannelKind::Chat).unwrap();
        let hook = reports.iter().find(|r| r.channel == ChannelKind::Webhook).unwrap();
        assert!(!chat.success);
        assert!(hook.success, "one failing channel must not block the other");
    }

    #[tokio::test]
    async fn test_fanout_is_parallel() {
        let registry = ProviderRegistry::with_retry(fast_retry());
        registry.register_channel(
            "t",
            Arc::new(SlowChannel {
                kind: ChannelKind::Chat,
                delay: Duration::from_millis(150),
            }),
        );
        registry.register_channel(
            "t",
            Arc::new(SlowChannel {
                kind: ChannelKind::Webhook,
                delay: Duration::from_millis(150),
            }),
        );

        let started = Instant::now();
        let reports = registry
            .dispatch("t", &[ChannelKind::Chat, ChannelKind::Webhook], &payload(), &[])
            .await;
        let elapsed = started.elapsed();

        assert!(reports.iter().all(|r| r.success));
        // Sequential sends would take at least 300ms.
        assert!(
            elapsed < Duration::from_millis(280),
            "fan-out took {elapsed:?}, expected parallel sends"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_channel_reports_failure() {
        let registry = ProviderRegistry::new();
        let reports = registry
            .dispatch("t", &[ChannelKind::Email], &payload(), &[])
            .await;

        assert!(!reports[0].success);
        assert_eq!(reports[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_shutdown_clears_cache() {
        let registry = ProviderRegistry::new();
        registry.register_channel("t", FlakyChannel::new(ChannelKind::Chat, 0, true));

        registry.shutdown();
        assert!(registry.channel("t", ChannelKind::Chat).is_none());
    }
}
