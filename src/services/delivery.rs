//! Forwarding staged payloads to the remote document API.
//!
//! The remote side is the Telegram Bot API, used purely as binary-object
//! storage: one `sendDocument` call per upload, addressed by a bot token and
//! a destination chat id. No retries; a failed call is reported immediately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;

use crate::services::identity::IdentityClaims;
use crate::services::staging::StagedUpload;

/// Bound on the outbound call so a large payload cannot hang a request
/// indefinitely.
const SEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Reference to the stored object, as returned by the remote API.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub file_id: String,
    pub message_id: i64,
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The remote envelope came back with `ok: false`; carries the
    /// remote-provided description.
    #[error("{0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn send_document(
        &self,
        staged: &StagedUpload,
        caption: &str,
    ) -> Result<StoredDocument, DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct SendDocumentEnvelope {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    document: SentDocument,
}

#[derive(Debug, Deserialize)]
struct SentDocument {
    file_id: String,
}

pub struct TelegramDocumentStore {
    endpoint: String,
    chat_id: String,
    http: reqwest::Client,
}

impl TelegramDocumentStore {
    pub fn new(bot_token: String, chat_id: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            endpoint: format!("https://api.telegram.org/bot{}/sendDocument", bot_token),
            chat_id,
            http,
        })
    }
}

#[async_trait]
impl DocumentStore for TelegramDocumentStore {
    async fn send_document(
        &self,
        staged: &StagedUpload,
        caption: &str,
    ) -> Result<StoredDocument, DeliveryError> {
        let file = staged
            .open()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let part = Part::stream_with_length(
            reqwest::Body::wrap_stream(ReaderStream::new(file)),
            staged.size,
        )
        .file_name(staged.filename.clone())
        .mime_str(
            staged
                .content_type
                .as_deref()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref()),
        )
        .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let envelope: SendDocumentEnvelope = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !envelope.ok {
            return Err(DeliveryError::Rejected(
                envelope
                    .description
                    .unwrap_or_else(|| "remote API reported failure".to_string()),
            ));
        }

        let result = envelope.result.ok_or_else(|| {
            DeliveryError::Transport("success envelope missing result".to_string())
        })?;

        Ok(StoredDocument {
            file_id: result.document.file_id,
            message_id: result.message_id,
        })
    }
}

/// Caption attached to the stored object: uploader identity, optional
/// destination folder, filename with size, and a timestamp.
pub fn build_caption(
    claims: &IdentityClaims,
    folder: Option<&str>,
    filename: &str,
    size: u64,
) -> String {
    let who = claims
        .name
        .as_deref()
        .or(claims.email.as_deref())
        .unwrap_or(&claims.uid);

    let mut caption = format!("📤 Upload from {} ({})\n", who, claims.uid);
    if let Some(folder) = folder {
        caption.push_str(&format!("📁 {}\n", folder));
    }
    caption.push_str(&format!("📄 {} ({})\n", filename, format_size(size)));
    caption.push_str(&format!(
        "🕒 {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    caption
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_envelope() {
        let envelope: SendDocumentEnvelope = serde_json::from_str(
            r#"{"ok": true, "result": {"message_id": 87, "chat": {"id": -100123}, "document": {"file_id": "BQACAgIAAxkDAAO", "file_unique_id": "AgADmQ", "file_size": 10}}}"#,
        )
        .unwrap();
        assert!(envelope.ok);
        let result = envelope.result.unwrap();
        assert_eq!(result.message_id, 87);
        assert_eq!(result.document.file_id, "BQACAgIAAxkDAAO");
    }

    #[test]
    fn test_parse_failure_envelope() {
        let envelope: SendDocumentEnvelope = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
        )
        .unwrap();
        assert!(!envelope.ok);
        assert_eq!(
            envelope.description.as_deref(),
            Some("Bad Request: chat not found")
        );
        assert!(envelope.result.is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(10), "10 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_build_caption_with_folder() {
        let claims = IdentityClaims {
            uid: "user-1".to_string(),
            email: Some("jane@example.com".to_string()),
            name: Some("Jane".to_string()),
        };
        let caption = build_caption(&claims, Some("invoices"), "report.pdf", 2048);
        assert!(caption.contains("Jane (user-1)"));
        assert!(caption.contains("📁 invoices"));
        assert!(caption.contains("report.pdf (2.0 KB)"));
    }

    #[test]
    fn test_build_caption_falls_back_to_uid() {
        let claims = IdentityClaims {
            uid: "user-1".to_string(),
            email: None,
            name: None,
        };
        let caption = build_caption(&claims, None, "a.bin", 1);
        assert!(caption.starts_with("📤 Upload from user-1 (user-1)"));
        assert!(!caption.contains("📁"));
    }
}
