use shared::crypto::{hash_password, verify_password};
use shared::CommonError;
use std::sync::Arc;
use validator::Validate;

use crate::auth::AuthService;
use crate::db::{sync_identity, Database};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::*;

pub struct UserService {
    db: Arc<dyn Database>,
    auth_service: Arc<AuthService>,
}

impl UserService {
    pub fn new(db: Arc<dyn Database>, auth_service: Arc<AuthService>) -> Self {
        Self { db, auth_service }
    }

    // ============= Authentication Methods =============

    /// Register a new user
    pub async fn register(&self, req: RegisterRequest) -> AppResult<AuthResponse> {
        req.validate()
            .map_err(|e| AppError::BadRequest(format!("{}", e)))?;

        let email = normalize_email(&req.email);
        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if self.db.find_account_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&req.password)?;

        let user = self
            .db
            .create_user(&email, name, &password_hash)
            .await
            .map_err(|e| match e {
                CommonError::AlreadyExists(_) => {
                    AppError::Conflict("An account with this email already exists".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!("User registered: id={}", user.id);
        self.issue_tokens(&user)
    }

    /// Login user
    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        req.validate()
            .map_err(|e| AppError::BadRequest(format!("{}", e)))?;

        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let user = self
            .db
            .find_account_by_email(&normalize_email(&req.email))
            .await?
            .ok_or_else(invalid)?;

        // Accounts created from provider tokens have no local password
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(&req.password, hash)? {
            tracing::warn!("Failed login attempt for user {}", user.id);
            return Err(invalid());
        }

        tracing::info!("User logged in: id={}", user.id);
        self.issue_tokens(&user)
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.auth_service.validate_token(refresh_token)?;

        if !claims.is_refresh_token() {
            return Err(AppError::Unauthorized("Invalid token type".to_string()));
        }

        let user_id = claims
            .user_id()
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        self.issue_tokens(&user)
    }

    /// Confirm the session and make sure the caller has a user row
    pub async fn session(&self, auth_user: &AuthUser) -> AppResult<SessionResponse> {
        let user = self.ensure_user(auth_user).await?;

        Ok(SessionResponse {
            authenticated: true,
            user: UserProfile::from(&user),
        })
    }

    pub async fn ensure_user(&self, auth_user: &AuthUser) -> AppResult<User> {
        let user = sync_identity(
            &*self.db,
            auth_user.id,
            auth_user.email.as_deref(),
            auth_user.name.as_deref(),
        )
        .await?;

        Ok(user)
    }

    fn issue_tokens(&self, user: &User) -> AppResult<AuthResponse> {
        Ok(AuthResponse {
            access_token: self.auth_service.generate_access_token(user)?,
            refresh_token: self.auth_service.generate_refresh_token(user)?,
            expires_in: self.auth_service.access_token_expiry(),
            user: UserProfile::from(user),
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::MemoryRepository;

    fn service() -> UserService {
        let auth = Arc::new(AuthService::new(AuthConfig {
            jwt_secret: "test_secret_key_for_testing_only".to_string(),
            access_token_expiry_hours: 1,
            refresh_token_expiry_days: 7,
        }));
        UserService::new(Arc::new(MemoryRepository::new()), auth)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "correct horse battery".to_string(),
            name: Some("Ada".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let registered = service.register(register_request("Ada@Example.com")).await.unwrap();
        assert_eq!(registered.user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(registered.expires_in, 3600);

        let logged_in = service
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "correct horse battery".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();
        assert!(matches!(
            service.register(register_request("ADA@example.com")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();

        let result = service
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "not the password".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let service = service();
        let registered = service.register(register_request("ada@example.com")).await.unwrap();

        assert!(matches!(
            service.refresh_token(&registered.access_token).await,
            Err(AppError::Unauthorized(_))
        ));

        let refreshed = service.refresh_token(&registered.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, registered.user.id);
    }
}
