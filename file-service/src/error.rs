use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::crypto::CryptoError;
use shared::types::ErrorBody;
use shared::CommonError;

use crate::storage::StorageError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CommonError> for AppError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::ValidationFailed(msg) => AppError::BadRequest(msg),
            CommonError::AuthenticationFailed(msg) => AppError::Unauthorized(msg),
            CommonError::AuthorizationFailed(msg) => AppError::Forbidden(msg),
            CommonError::NotFound(msg) => AppError::NotFound(msg),
            CommonError::AlreadyExists(msg) => AppError::Conflict(msg),
            CommonError::Expired(msg) => AppError::Gone(msg),
            CommonError::ExternalService(msg) => AppError::ServiceUnavailable(msg),
            CommonError::Database(msg) | CommonError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound("File not found on server".to_string()),
            StorageError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            StorageError::PermissionDenied(msg) => {
                tracing::error!("Storage permission error: {}", msg);
                AppError::Forbidden("Storage permission error".to_string())
            }
            StorageError::TooLarge(_) => {
                AppError::PayloadTooLarge("File too large for storage".to_string())
            }
            StorageError::Other(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("Request body too large".to_string())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Dependency unavailable: {}", msg);
                "Service temporarily unavailable".to_string()
            }
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Gone(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::UnsupportedMediaType(msg) => msg,
        };

        (status, Json(ErrorBody::new(status.as_u16(), message))).into_response()
    }
}
