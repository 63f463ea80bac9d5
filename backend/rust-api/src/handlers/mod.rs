use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::errors::ProgressError;
use crate::metrics;
use crate::services::AppState;

pub mod challenges;
pub mod dashboard;
pub mod tasks;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Engine(ProgressError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            ApiError::Engine(err) => {
                let status = match &err {
                    ProgressError::NotFound(_) => StatusCode::NOT_FOUND,
                    ProgressError::NotEnrolled { .. } => StatusCode::CONFLICT,
                    ProgressError::GradingInputInvalid(_) => StatusCode::BAD_REQUEST,
                    ProgressError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                // Storage details stay in the logs
                let message = match &err {
                    ProgressError::StorageUnavailable(_) => {
                        "Storage is temporarily unavailable, please retry".to_string()
                    }
                    other => other.to_string(),
                };
                (status, err.kind(), message)
            }
        };

        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = probe(state.store.ping()).await;
    let cache = probe(state.cache.ping()).await;

    let healthy = store.is_ok() && cache.is_ok();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "challenges-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": {
                "store": dependency_status(store),
                "cache": dependency_status(cache),
            }
        })),
    )
}

async fn probe<F>(check: F) -> Result<(), String>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(std::time::Duration::from_secs(1), check).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("timeout after 1s".to_string()),
    }
}

fn dependency_status(result: Result<(), String>) -> serde_json::Value {
    match result {
        Ok(()) => json!({ "status": "healthy" }),
        Err(error) => json!({ "status": "unhealthy", "error": error }),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic auth against `config.metrics_auth`
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != state.config.metrics_auth {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
