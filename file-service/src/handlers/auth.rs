use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(body)| body).map_err(AppError::from)
}

/// Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let response = state.user_service.register(json_body(payload)?).await?;
    Ok(Json(response))
}

/// Login user
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let response = state.user_service.login(json_body(payload)?).await?;
    Ok(Json(response))
}

/// Refresh access token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let req = json_body(payload)?;
    let response = state.user_service.refresh_token(&req.refresh_token).await?;
    Ok(Json(response))
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<SessionResponse>> {
    let response = state.user_service.session(&user).await?;
    Ok(Json(response))
}
