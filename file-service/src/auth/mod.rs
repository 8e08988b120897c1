use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::User;

/// Audience the hosted provider stamps on user tokens
pub const TOKEN_AUDIENCE: &str = "authenticated";

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    /// Absent on provider-issued tokens, which are always access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata
            .name
            .as_deref()
            .or(self.user_metadata.full_name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    pub fn is_access_token(&self) -> bool {
        self.token_type.as_deref().map_or(true, |t| t == ACCESS_TOKEN)
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type.as_deref() == Some(REFRESH_TOKEN)
    }
}

pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    fn claims_for(&self, user: &User, token_type: &str, lifetime: Duration) -> Claims {
        let now = Utc::now();

        Claims {
            sub: user.id.to_string(),
            email: user.email.clone().unwrap_or_default(),
            user_metadata: UserMetadata {
                name: user.name.clone(),
                full_name: None,
            },
            aud: TOKEN_AUDIENCE.to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            token_type: Some(token_type.to_string()),
        }
    }

    fn sign(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Generate an access token
    pub fn generate_access_token(&self, user: &User) -> AppResult<String> {
        let lifetime = Duration::hours(self.config.access_token_expiry_hours as i64);
        self.sign(&self.claims_for(user, ACCESS_TOKEN, lifetime))
    }

    /// Generate a refresh token
    pub fn generate_refresh_token(&self, user: &User) -> AppResult<String> {
        let lifetime = Duration::days(self.config.refresh_token_expiry_days as i64);
        self.sign(&self.claims_for(user, REFRESH_TOKEN, lifetime))
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry_hours * 3600
    }
}
