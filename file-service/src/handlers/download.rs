use axum::{
    extract::{Path, Query, State},
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::DownloadQuery;
use crate::AppState;

/// Header carrying a file password when it should stay out of the URL
pub const FILE_PASSWORD_HEADER: &str = "x-file-password";

/// Stream a shared file to anyone holding the link
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let password = supplied_password(query.password, &headers);

    let download = state
        .file_service
        .download(&share_id, password.as_deref())
        .await?;

    let mime_type = download
        .mime_type
        .parse::<mime::Mime>()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);
    let content_type = HeaderValue::from_str(mime_type.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let content_length = download.data.len();

    let mut response = (StatusCode::OK, download.data).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CONTENT_TYPE, content_type);
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&download.file_name),
    );
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response_headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response_headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    Ok(response)
}

/// Non-empty `?password=`, else the password header
fn supplied_password(query: Option<String>, headers: &HeaderMap) -> Option<String> {
    let non_empty = |p: &String| !p.is_empty();

    query.filter(non_empty).or_else(|| {
        headers
            .get(FILE_PASSWORD_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(non_empty)
    })
}

/// `attachment; filename="..."` with an RFC 5987 `filename*` for non-ASCII names
fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    let mut value = format!("attachment; filename=\"{}\"", fallback);
    if !file_name.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        value.push_str(&urlencoding::encode(file_name));
    }

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
