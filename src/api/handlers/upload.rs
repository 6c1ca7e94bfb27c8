use axum::{
    Extension, Json,
    extract::{Multipart, State},
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::AppState;
use crate::api::error::AppError;
use crate::services::delivery::{DeliveryError, build_caption};
use crate::services::identity::IdentityClaims;
use crate::services::staging::StagedUpload;
use crate::utils::validation::sanitize_filename;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub message_id: i64,
    pub file_name: String,
    pub size: u64,
}

/// All multipart fields, parsed and validated once per request.
#[derive(Default, Validate)]
struct UploadRequest {
    file: Option<StagedUpload>,
    #[validate(length(max = 128, message = "userId too long"))]
    user_id: Option<String>,
    #[validate(length(max = 255, message = "fileName too long"))]
    file_name: Option<String>,
    #[validate(length(max = 255, message = "folder too long"))]
    folder: Option<String>,
}

impl UploadRequest {
    async fn from_multipart(
        multipart: &mut Multipart,
        max_file_size: u64,
    ) -> Result<Self, AppError> {
        let mut request = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(err_msg)
            }
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let declared_filename = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field.content_type().map(|s| s.to_string());

                let body_with_io_error = field.map_err(std::io::Error::other);
                let reader = StreamReader::new(body_with_io_error);

                request.file = Some(
                    StagedUpload::from_reader(
                        declared_filename,
                        content_type,
                        reader,
                        max_file_size,
                    )
                    .await?,
                );
            } else if name == "userId" {
                request.user_id = field.text().await.ok().filter(|t| !t.is_empty());
            } else if name == "fileName" {
                request.file_name = field.text().await.ok().filter(|t| !t.is_empty());
            } else if name == "folder" {
                request.folder = field.text().await.ok().filter(|t| !t.is_empty());
            }
        }

        Ok(request)
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = String, description = "multipart/form-data with a `file` part and optional `userId`, `fileName`, `folder` fields", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File relayed to remote storage", body = UploadResponse),
        (status = 400, description = "No file provided"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Declared user id does not match the token"),
        (status = 500, description = "Remote API failure")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "upload"
)]
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(claims): Extension<IdentityClaims>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut request =
        UploadRequest::from_multipart(&mut multipart, state.config.max_file_size).await?;
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // A declared owner that does not match the token never reaches the
    // remote API; the staged file is released first.
    if let Some(declared) = request.user_id.as_deref() {
        if declared != claims.uid {
            tracing::warn!(
                declared = %declared,
                uid = %claims.uid,
                "Upload rejected: ownership mismatch"
            );
            if let Some(staged) = request.file.take() {
                staged.discard();
            }
            return Err(AppError::OwnershipMismatch);
        }
    }

    let mut staged = request
        .file
        .ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    if let Some(override_name) = request.file_name {
        staged.filename = override_name;
    }
    staged.filename =
        sanitize_filename(&staged.filename).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let caption = build_caption(
        &claims,
        request.folder.as_deref(),
        &staged.filename,
        staged.size,
    );

    let stored = match state.documents.send_document(&staged, &caption).await {
        Ok(stored) => stored,
        Err(DeliveryError::Rejected(description)) => {
            staged.discard();
            return Err(AppError::Upstream(description));
        }
        Err(DeliveryError::Transport(detail)) => {
            staged.discard();
            return Err(AppError::Internal(detail));
        }
    };

    info!(
        file_id = %stored.file_id,
        message_id = stored.message_id,
        size = staged.size,
        "📦 Upload relayed for {}",
        claims.uid
    );

    let response = UploadResponse {
        success: true,
        file_id: stored.file_id,
        message_id: stored.message_id,
        file_name: staged.filename.clone(),
        size: staged.size,
    };
    staged.discard();

    Ok(Json(response))
}
