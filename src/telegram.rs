//! Telegram channel — native Bot API client.
//!
//! Long-polls `getUpdates` for inbound messages and sends text and
//! photo responses. The outbound half (plus file-handle resolution)
//! sits behind the [`Channel`] trait so the pipeline can run against a
//! mock in tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::ChannelError;

/// Long-poll timeout passed to getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

/// HTTP deadline for the long-poll call (poll timeout plus headroom).
const POLL_HTTP_TIMEOUT: Duration = Duration::from_secs(POLL_TIMEOUT_SECS + 15);

/// HTTP deadline for every other Bot API call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Back-off after a failed poll before trying again.
pub const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

// ── Inbound payloads ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    /// Unix timestamp of the message, used to name staged files.
    #[serde(default)]
    pub date: i64,
    /// Photo renditions, ordered by resolution (smallest first).
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
}

impl Message {
    /// The highest-resolution rendition — Telegram orders the array by
    /// size, so that is the last entry.
    pub fn best_photo(&self) -> Option<&PhotoSize> {
        self.photo.last()
    }
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Standard Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

// ── Channel seam ────────────────────────────────────────────────────

/// The chat-platform boundary as the pipeline sees it: resolve a photo
/// handle and send responses back to a conversation.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Resolve a platform file id to a downloadable file path.
    async fn resolve_file_path(&self, file_id: &str) -> Result<String, ChannelError>;

    /// Send a plain text message to a conversation.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChannelError>;

    /// Send a local image file as a photo attachment.
    async fn send_photo(&self, chat_id: i64, path: &Path) -> Result<(), ChannelError>;
}

// ── Client ──────────────────────────────────────────────────────────

/// Telegram Bot API client.
pub struct TelegramApi {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// One long-poll round: returns the next batch of updates at or
    /// after `offset`.
    pub async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, ChannelError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .timeout(POLL_HTTP_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::BadStatus {
                method: "getUpdates",
                status,
                body,
            });
        }

        let envelope: ApiEnvelope<Vec<Update>> = resp.json().await?;
        if !envelope.ok {
            return Err(ChannelError::InvalidResponse {
                method: "getUpdates",
                reason: envelope.description.unwrap_or_else(|| "ok=false".into()),
            });
        }
        Ok(envelope.result.unwrap_or_default())
    }
}

#[async_trait]
impl Channel for TelegramApi {
    async fn resolve_file_path(&self, file_id: &str) -> Result<String, ChannelError> {
        let resp = self
            .client
            .post(self.api_url("getFile"))
            .timeout(HTTP_TIMEOUT)
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::BadStatus {
                method: "getFile",
                status,
                body,
            });
        }

        let envelope: ApiEnvelope<FileInfo> = resp.json().await?;
        envelope
            .result
            .and_then(|info| info.file_path)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| ChannelError::InvalidResponse {
                method: "getFile",
                reason: envelope
                    .description
                    .unwrap_or_else(|| "missing file_path".into()),
            })
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(HTTP_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::BadStatus {
                method: "sendMessage",
                status,
                body,
            });
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, path: &Path) -> Result<(), ChannelError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.png")
            .to_string();

        let file_bytes =
            tokio::fs::read(path)
                .await
                .map_err(|source| ChannelError::Attachment {
                    path: path.display().to_string(),
                    source,
                })?;
        let part = Part::bytes(file_bytes).file_name(file_name.clone());

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);

        let resp = self
            .client
            .post(self.api_url("sendPhoto"))
            .timeout(HTTP_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::BadStatus {
                method: "sendPhoto",
                status,
                body,
            });
        }

        tracing::info!(chat_id, file = %file_name, "Telegram photo sent");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
