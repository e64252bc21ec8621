pub mod telegram;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Where published items go. Resolved once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatTarget {
    Handle(String),
    Id(i64),
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Handle(handle) => write!(f, "{handle}"),
            ChatTarget::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// Flood control: the remote side asks us to wait before trying again.
    RateLimited { retry_after: Duration },
    /// Timeouts, connection resets, gateway errors.
    Network(String),
    Other(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::RateLimited { retry_after } => {
                write!(f, "Rate limited: retry after {}s", retry_after.as_secs())
            }
            DeliveryError::Network(msg) => write!(f, "Network error: {msg}"),
            DeliveryError::Other(msg) => write!(f, "Delivery error: {msg}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, target: &ChatTarget, text: &str) -> Result<(), DeliveryError>;

    async fn send_photo(
        &self,
        target: &ChatTarget,
        content_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    async fn send_video(
        &self,
        target: &ChatTarget,
        content_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;
}
