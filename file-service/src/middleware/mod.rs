use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shared::types::ErrorBody;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::AppState;

/// Caller identity taken from a valid bearer access token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    /// `None` when the token carries no email claim
    pub email: Option<String>,
    pub name: Option<String>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if !claims.is_access_token() {
            return Err(AuthError::InvalidTokenType);
        }

        let id = claims.user_id().ok_or(AuthError::InvalidToken)?;
        let name = claims.display_name().map(str::to_string);
        let email = Some(claims.email.trim().to_string()).filter(|e| !e.is_empty());

        Ok(Self { id, email, name })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        // Extract token from "Bearer {token}" format
        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidFormat)?;

        let claims = state
            .auth_service
            .validate_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        AuthUser::try_from(claims)
    }
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    InvalidTokenType,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing authorization token",
            AuthError::InvalidFormat => "Invalid authorization format",
            AuthError::InvalidToken => "Invalid or expired token",
            AuthError::InvalidTokenType => "Invalid token type",
        };
        let status = StatusCode::UNAUTHORIZED;

        (status, Json(ErrorBody::new(status.as_u16(), message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserMetadata;

    fn claims(token_type: Option<&str>, sub: String) -> Claims {
        Claims {
            sub,
            email: "a@example.com".to_string(),
            user_metadata: UserMetadata::default(),
            aud: "authenticated".to_string(),
            exp: 0,
            iat: 0,
            token_type: token_type.map(str::to_string),
        }
    }

    #[test]
    fn test_refresh_token_is_not_an_identity() {
        let result = AuthUser::try_from(claims(Some("refresh"), Uuid::new_v4().to_string()));
        assert_eq!(result, Err(AuthError::InvalidTokenType));
    }

    #[test]
    fn test_subject_must_be_uuid() {
        let result = AuthUser::try_from(claims(None, "not-a-uuid".to_string()));
        assert_eq!(result, Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_access_claims_convert() {
        let id = Uuid::new_v4();
        let user = AuthUser::try_from(claims(Some("access"), id.to_string())).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert_eq!(user.name, None);
    }

    #[test]
    fn test_blank_email_claim_is_absent() {
        let mut blank = claims(None, Uuid::new_v4().to_string());
        blank.email = "  ".to_string();

        let user = AuthUser::try_from(blank).unwrap();
        assert_eq!(user.email, None);
    }
}
