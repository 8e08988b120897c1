//! Common error types for DropLink

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource expired: {0}")]
    Expired(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommonError {
    pub fn http_status_code(&self) -> u16 {
        match self {
            CommonError::ValidationFailed(_) => 400,
            CommonError::AuthenticationFailed(_) => 401,
            CommonError::AuthorizationFailed(_) => 403,
            CommonError::NotFound(_) => 404,
            CommonError::AlreadyExists(_) => 409,
            CommonError::Expired(_) => 410,
            CommonError::ExternalService(_) => 503,
            _ => 500,
        }
    }

    /// True when the message is safe to show to an API caller
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }
}

impl From<sqlx::Error> for CommonError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CommonError::NotFound("row".to_string()),
            // 23505 = unique_violation
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                CommonError::AlreadyExists(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                CommonError::ExternalService(err.to_string())
            }
            _ => CommonError::Database(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        CommonError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(CommonError::NotFound("test".to_string()).http_status_code(), 404);
        assert_eq!(CommonError::AuthenticationFailed("test".to_string()).http_status_code(), 401);
        assert_eq!(CommonError::ValidationFailed("test".to_string()).http_status_code(), 400);
        assert_eq!(CommonError::Expired("test".to_string()).http_status_code(), 410);
        assert_eq!(CommonError::Database("test".to_string()).http_status_code(), 500);
    }

    #[test]
    fn test_client_errors() {
        assert!(CommonError::AlreadyExists("test".to_string()).is_client_error());
        assert!(!CommonError::Internal("test".to_string()).is_client_error());
        assert!(!CommonError::ExternalService("test".to_string()).is_client_error());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: CommonError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CommonError::NotFound(_)));
    }
}
