use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::ApiError;
use crate::{
    middlewares::auth::JwtClaims,
    models::{
        content::{ChallengeDetailResponse, ChallengeListResponse},
        progress::ProgressResponse,
    },
    services::{
        content_service::ContentService, enrollment_service::EnrollmentService, AppState,
        EngineContext,
    },
};

pub async fn list_challenges(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChallengeListResponse>, ApiError> {
    let service = ContentService::new(EngineContext::from_state(&state));
    let challenges = service.list_challenges().await?;

    Ok(Json(ChallengeListResponse { challenges }))
}

pub async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<String>,
) -> Result<Json<ChallengeDetailResponse>, ApiError> {
    let service = ContentService::new(EngineContext::from_state(&state));
    Ok(Json(service.challenge_detail(&challenge_id).await?))
}

/// Enrolls the caller. Repeating the call returns the existing record.
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(challenge_id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    tracing::info!("Enroll request: user={}, challenge={}", claims.sub, challenge_id);

    let service = EnrollmentService::new(EngineContext::from_state(&state));
    let progress = service.enroll(&claims.sub, &challenge_id).await?;

    Ok(Json(progress.into()))
}

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(challenge_id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let service = EnrollmentService::new(EngineContext::from_state(&state));
    let progress = service.get_progress(&claims.sub, &challenge_id).await?;

    Ok(Json(progress.into()))
}
