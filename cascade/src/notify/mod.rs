//! Notification delivery: channel adapters and the per-tenant registry.
//!
//! Delivery fans out to every configured channel in parallel, each send
//! wrapped in a retry policy that only retries transient transport errors.
//! One channel failing never stops the others.

mod channel;
mod chat;
mod email;
mod error;
mod payload;
mod registry;
mod webhook;

pub use channel::{ChannelConfig, ChannelKind, NotificationChannel};
pub use chat::ChatChannel;
pub use email::EmailChannel;
pub use error::NotifyError;
pub use payload::{NotificationPayload, Severity};
pub use registry::{DeliveryReport, ProviderRegistry};
