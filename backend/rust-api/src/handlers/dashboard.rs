use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use super::ApiError;
use crate::{
    middlewares::auth::JwtClaims,
    models::dashboard::DashboardSummary,
    services::{dashboard_service::DashboardService, AppState, EngineContext},
};

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let service = DashboardService::new(EngineContext::from_state(&state));
    Ok(Json(service.summary(&claims.sub).await?))
}
