use std::sync::Arc;

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1",
            api_routes()
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/challenges", get(handlers::challenges::list_challenges))
        .route("/challenges/{id}", get(handlers::challenges::get_challenge))
        .route("/challenges/{id}/enroll", post(handlers::challenges::enroll))
        .route(
            "/challenges/{id}/progress",
            get(handlers::challenges::get_progress),
        )
        .route("/tasks/{id}/complete", post(handlers::tasks::complete_task))
        .route("/tasks/{id}/quiz", post(handlers::tasks::submit_quiz))
        .route(
            "/tasks/{id}/submission",
            get(handlers::tasks::get_submission),
        )
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
}
