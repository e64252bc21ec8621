use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ChatTarget, DeliveryError, Transport};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Used when a flood-control reply carries no `retry_after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Longest flood-control wait honoured from a reply.
const MAX_RETRY_AFTER_SECS: u64 = 24 * 60 * 60;

const PARSE_MODE: &str = "HTML";

/// Minimal Telegram Bot API client: the three send calls used for publishing
/// plus the long-poll calls used by the ingestion loop.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub video: Option<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, String> {
        Self::with_api_base(DEFAULT_API_BASE, token)
    }

    pub fn with_api_base(api_base: &str, token: &str) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError> {
        let mut req = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await.map_err(classify_request_error)?;
        let status = resp.status();

        let parsed: ApiResponse<T> = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) if status.is_server_error() => {
                return Err(DeliveryError::Network(format!("{method}: HTTP {status}: {e}")));
            }
            Err(e) => return Err(classify_request_error(e)),
        };

        if parsed.ok {
            return parsed
                .result
                .ok_or_else(|| DeliveryError::Other(format!("{method}: response had no result")));
        }

        Err(classify_api_error(
            parsed.error_code.unwrap_or(status.as_u16()),
            parsed.description.as_deref().unwrap_or("no description"),
            parsed.parameters.and_then(|p| p.retry_after),
        ))
    }

    /// Plain-text reply to a private chat (no markup).
    pub async fn reply(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.call::<serde_json::Value>(
            "sendMessage",
            &json!({ "chat_id": chat_id, "text": text }),
            None,
        )
        .await?;
        Ok(())
    }

    /// Long-poll for new messages. Only `message` updates are requested.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, DeliveryError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    /// Switch to polling mode, discarding anything that arrived while we were down.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), DeliveryError> {
        self.call::<bool>(
            "deleteWebhook",
            &json!({ "drop_pending_updates": drop_pending_updates }),
            None,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(&self, target: &ChatTarget, text: &str) -> Result<(), DeliveryError> {
        self.call::<serde_json::Value>(
            "sendMessage",
            &json!({ "chat_id": target, "text": text, "parse_mode": PARSE_MODE }),
            None,
        )
        .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        target: &ChatTarget,
        content_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let mut body = json!({ "chat_id": target, "photo": content_ref, "parse_mode": PARSE_MODE });
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }
        self.call::<serde_json::Value>("sendPhoto", &body, None).await?;
        Ok(())
    }

    async fn send_video(
        &self,
        target: &ChatTarget,
        content_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let mut body = json!({ "chat_id": target, "video": content_ref, "parse_mode": PARSE_MODE });
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }
        self.call::<serde_json::Value>("sendVideo", &body, None).await?;
        Ok(())
    }
}

fn classify_request_error(e: reqwest::Error) -> DeliveryError {
    if e.is_decode() || e.is_builder() {
        DeliveryError::Other(e.to_string())
    } else {
        DeliveryError::Network(e.to_string())
    }
}

/// Map a Bot API error reply onto the recovery categories.
fn classify_api_error(code: u16, description: &str, retry_after: Option<u64>) -> DeliveryError {
    if code == StatusCode::TOO_MANY_REQUESTS.as_u16() || retry_after.is_some() {
        return DeliveryError::RateLimited {
            retry_after: Duration::from_secs(
                retry_after
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                    .min(MAX_RETRY_AFTER_SECS),
            ),
        };
    }

    if (500..600).contains(&code) {
        return DeliveryError::Network(format!("{code}: {description}"));
    }

    DeliveryError::Other(format!("{code}: {description}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_control_uses_retry_after() {
        assert_eq!(
            classify_api_error(429, "Too Many Requests: retry after 7", Some(7)),
            DeliveryError::RateLimited { retry_after: Duration::from_secs(7) }
        );
    }

    #[test]
    fn flood_control_without_wait_falls_back() {
        assert_eq!(
            classify_api_error(429, "Too Many Requests", None),
            DeliveryError::RateLimited { retry_after: Duration::from_secs(5) }
        );
    }

    #[test]
    fn flood_control_wait_is_capped_at_a_day() {
        assert_eq!(
            classify_api_error(429, "Too Many Requests", Some(u64::MAX)),
            DeliveryError::RateLimited { retry_after: Duration::from_secs(86_400) }
        );
    }

    #[test]
    fn gateway_errors_are_network_failures() {
        assert!(matches!(
            classify_api_error(502, "Bad Gateway", None),
            DeliveryError::Network(_)
        ));
    }

    #[test]
    fn bad_request_is_other_failure() {
        let err = classify_api_error(400, "Bad Request: chat not found", None);
        assert_eq!(
            err,
            DeliveryError::Other("400: Bad Request: chat not found".to_string())
        );
    }

    #[test]
    fn chat_target_serializes_as_handle_or_number() {
        assert_eq!(
            json!({ "chat_id": ChatTarget::Handle("@news".into()) }),
            json!({ "chat_id": "@news" })
        );
        assert_eq!(
            json!({ "chat_id": ChatTarget::Id(-100123) }),
            json!({ "chat_id": -100123 })
        );
    }

    #[test]
    fn parses_photo_update() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "chat": { "id": 42, "type": "private" },
                "caption": "sunset",
                "photo": [
                    { "file_id": "small", "file_unique_id": "a", "width": 90, "height": 60 },
                    { "file_id": "large", "file_unique_id": "b", "width": 1280, "height": 853 }
                ]
            }
        }))
        .unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.photo.unwrap().last().unwrap().file_id, "large");
        assert_eq!(message.caption.as_deref(), Some("sunset"));
    }
}
