use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::UploadResponse;
use crate::services::UploadInput;
use crate::AppState;

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too large".to_string())
    } else {
        AppError::BadRequest(format!("Invalid multipart: {}", err.body_text()))
    }
}

/// Handle a multipart upload: `file`, optional `password` and `expiresAt`
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    tracing::info!("Received upload request from user {}", user.id);

    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut password: Option<String> = None;
    let mut expires_at: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();
        tracing::debug!("Processing field: {}", field_name);

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;

                // Fail fast before the rest of the form is read
                if data.len() > state.file_service.max_upload_bytes() {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File too large. Maximum size is {}",
                        shared::files::format_file_size(
                            state.file_service.max_upload_bytes() as u64
                        )
                    )));
                }

                file = Some((file_name, content_type, data));
            }
            "password" => password = Some(field.text().await.map_err(multipart_error)?),
            "expiresAt" => expires_at = Some(field.text().await.map_err(multipart_error)?),
            _ => {
                // Drain unknown parts
                field.bytes().await.map_err(multipart_error)?;
            }
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let uploaded = state
        .file_service
        .upload(
            &user,
            UploadInput {
                file_name,
                content_type,
                data,
                password,
                expires_at,
            },
        )
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        file: uploaded,
    }))
}
