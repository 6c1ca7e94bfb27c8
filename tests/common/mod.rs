#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use upload_relay::config::RelayConfig;
use upload_relay::services::delivery::{DeliveryError, DocumentStore, StoredDocument};
use upload_relay::services::identity::{IdentityClaims, IdentityVerifier, VerifyError};
use upload_relay::services::staging::StagedUpload;
use upload_relay::{AppState, create_app};
use uuid::Uuid;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// Accepts tokens of the form `valid-<uid>`; everything else is rejected.
pub struct MockVerifier;

#[async_trait]
impl IdentityVerifier for MockVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, VerifyError> {
        match token.strip_prefix("valid-") {
            Some(uid) => Ok(IdentityClaims {
                uid: uid.to_string(),
                email: Some(format!("{uid}@example.com")),
                name: Some("Test User".to_string()),
            }),
            None => Err(VerifyError::Rejected("signature mismatch".to_string())),
        }
    }
}

pub struct RecordedCall {
    pub filename: String,
    pub caption: String,
    pub size: u64,
    pub staged_path: PathBuf,
}

/// Records every outbound call; optionally fails with a fixed remote
/// rejection instead of succeeding.
pub struct RecordingStore {
    pub calls: Mutex<Vec<RecordedCall>>,
    pub reject_with: Option<String>,
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn send_document(
        &self,
        staged: &StagedUpload,
        caption: &str,
    ) -> Result<StoredDocument, DeliveryError> {
        self.calls.lock().unwrap().push(RecordedCall {
            filename: staged.filename.clone(),
            caption: caption.to_string(),
            size: staged.size,
            staged_path: staged.path().to_path_buf(),
        });

        if let Some(description) = &self.reject_with {
            return Err(DeliveryError::Rejected(description.clone()));
        }

        Ok(StoredDocument {
            file_id: Uuid::new_v4().to_string(),
            message_id: 42,
        })
    }
}

pub fn recording_store() -> Arc<RecordingStore> {
    Arc::new(RecordingStore {
        calls: Mutex::new(Vec::new()),
        reject_with: None,
    })
}

pub fn rejecting_store(description: &str) -> Arc<RecordingStore> {
    Arc::new(RecordingStore {
        calls: Mutex::new(Vec::new()),
        reject_with: Some(description.to_string()),
    })
}

pub fn relay_app(store: Arc<RecordingStore>) -> Router {
    relay_app_with_config(store, RelayConfig::default())
}

pub fn relay_app_with_config(store: Arc<RecordingStore>, config: RelayConfig) -> Router {
    create_app(AppState {
        verifier: Arc::new(MockVerifier),
        documents: store,
        config,
    })
}

/// Hand-rolled multipart/form-data body, one part per call.
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
