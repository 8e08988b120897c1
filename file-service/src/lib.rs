//! DropLink file service
//!
//! Authenticated uploads, public share links with optional password and
//! expiry, and the account endpoints that issue the bearer tokens.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod workers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::services::{FileService, UserService};
use crate::storage::ObjectStore;

/// Room for multipart boundaries and the small text fields
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn ObjectStore>,
    pub auth_service: Arc<AuthService>,
    pub file_service: Arc<FileService>,
    pub user_service: Arc<UserService>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Database>, store: Arc<dyn ObjectStore>) -> Self {
        let auth_service = Arc::new(AuthService::new(config.auth.clone()));
        let file_service = Arc::new(FileService::new(
            db.clone(),
            store.clone(),
            config.upload.clone(),
            config.server.public_base_url.clone(),
        ));
        let user_service = Arc::new(UserService::new(db.clone(), auth_service.clone()));

        Self {
            config,
            db,
            store,
            auth_service,
            file_service,
            user_service,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .upload
        .max_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/health/dependencies",
            get(handlers::health::dependencies),
        )
        // Authentication endpoints
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/auth/session", get(handlers::auth::session))
        // File endpoints
        .route("/api/upload", post(handlers::upload::upload_file))
        .route(
            "/api/download/:share_id",
            get(handlers::download::download_file),
        )
        .route(
            "/api/files",
            get(handlers::files::list_files).delete(handlers::files::delete_file),
        )
        .route(
            "/api/files/:share_id",
            get(handlers::files::file_info).delete(handlers::files::delete_file_by_share_id),
        )
        // Extractors turn an over-limit body into a JSON 413
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
