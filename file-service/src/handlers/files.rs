use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use shared::types::SuccessResponse;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{DeleteFileRequest, FileInfoResponse, FileListResponse};
use crate::AppState;

/// List the caller's files, newest first
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<FileListResponse>> {
    let files = state.file_service.list_files(user.id).await?;
    Ok(Json(FileListResponse { files }))
}

/// Delete by `{ "fileId": ... }` body
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<DeleteFileRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse>> {
    let Json(req) = payload?;

    let file_id = Uuid::parse_str(req.file_id.trim())
        .map_err(|_| AppError::BadRequest("Invalid file id".to_string()))?;

    state.file_service.delete_file(user.id, file_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn delete_file_by_share_id(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(share_id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    state
        .file_service
        .delete_by_share_id(user.id, &share_id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Public metadata for a share link, never the password hash
pub async fn file_info(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> AppResult<Json<FileInfoResponse>> {
    let info = state.file_service.file_info(&share_id).await?;
    Ok(Json(info))
}
