use axum::{extract::State, http::StatusCode, Json};
use futures::join;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "file-service",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn check_dependency<F, E>(backend: &'static str, check: F) -> Value
where
    F: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    match check.await {
        Ok(()) => json!({
            "ok": true,
            "backend": backend,
            "latencyMs": started.elapsed().as_millis() as u64,
        }),
        Err(e) => {
            tracing::error!("{} health check failed: {}", backend, e);
            json!({
                "ok": false,
                "backend": backend,
                "error": e.to_string(),
            })
        }
    }
}

/// Ping the data store and the object store; 503 if either fails
pub async fn dependencies(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (database, storage) = join!(
        check_dependency(state.db.backend_name(), state.db.health_check()),
        check_dependency(state.store.backend_name(), state.store.health_check()),
    );

    let success = database["ok"] == true && storage["ok"] == true;
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "success": success,
            "results": {
                "database": database,
                "storage": storage,
            },
        })),
    )
}
