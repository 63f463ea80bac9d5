use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use validator::Validate;

use super::ApiError;
use crate::{
    errors::ProgressError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        progress::TaskCompletionResponse,
        submission::{CompleteTaskRequest, QuizGrade, SubmissionResponse, SubmitQuizRequest},
    },
    services::{completion_service::CompletionService, AppState, EngineContext},
};

pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(task_id): Path<String>,
    body: Option<AppJson<CompleteTaskRequest>>,
) -> Result<Json<TaskCompletionResponse>, ApiError> {
    let req = body.map(|AppJson(req)| req).unwrap_or_default();
    req.validate().map_err(|e| {
        tracing::warn!("Completion request validation failed: {}", e);
        // Answer lists are grading input on every route
        if e.field_errors().contains_key("quiz_answers") {
            ApiError::from(ProgressError::GradingInputInvalid(e.to_string()))
        } else {
            ApiError::bad_request(format!("Validation error: {}", e))
        }
    })?;

    tracing::info!("Complete task request: user={}, task={}", claims.sub, task_id);

    let service = CompletionService::new(EngineContext::from_state(&state));
    let completion = service.complete_task(&claims.sub, &task_id, &req).await?;

    Ok(Json(TaskCompletionResponse {
        submission: completion.submission.into(),
        progress: completion.progress.into(),
    }))
}

pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(task_id): Path<String>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> Result<Json<QuizGrade>, ApiError> {
    req.validate()
        .map_err(|e| ProgressError::GradingInputInvalid(e.to_string()))?;

    let service = CompletionService::new(EngineContext::from_state(&state));
    let grade = service.submit_quiz(&claims.sub, &task_id, &req.answers).await?;

    Ok(Json(grade))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(task_id): Path<String>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let service = CompletionService::new(EngineContext::from_state(&state));
    let submission = service.get_submission(&claims.sub, &task_id).await?;

    Ok(Json(submission.into()))
}
