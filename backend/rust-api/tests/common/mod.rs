use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use challenges_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::content::{Challenge, Quiz, QuizQuestion, Task},
    services::{
        cache::{DashboardCache, MemoryDashboardCache},
        AppState,
    },
    storage::{ContentSeed, MemoryStore, ProgressStore},
};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryDashboardCache>,
    pub config: Config,
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config::default();
    let store = Arc::new(MemoryStore::with_seed(seed()).await);
    let cache = Arc::new(MemoryDashboardCache::new(config.dashboard_cache_ttl()));

    let app_state = Arc::new(AppState::from_parts(
        config.clone(),
        store.clone() as Arc<dyn ProgressStore>,
        cache.clone() as Arc<dyn DashboardCache>,
    ));

    TestApp {
        router: create_router(app_state),
        store,
        cache,
        config,
    }
}

/// Two challenges: a 30-day one whose first task carries a three-question quiz,
/// and a 7-day one with a single task.
fn seed() -> ContentSeed {
    let challenge = |id: &str, title: &str, duration: u32| Challenge {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        duration,
    };
    let task = |id: &str, challenge_id: &str, day_number: u32, quiz: Option<Quiz>| Task {
        id: id.to_string(),
        challenge_id: challenge_id.to_string(),
        day_number,
        title: format!("Day {}", day_number),
        content: String::new(),
        quiz,
    };
    let question = |correct_answer: u32| QuizQuestion {
        question: format!("Question {}", correct_answer),
        options: vec!["a".into(), "b".into(), "c".into()],
        correct_answer,
    };

    ContentSeed {
        challenges: vec![
            challenge("focus-30", "30 Days of Focus", 30),
            challenge("sleep-7", "Sleep Reset", 7),
        ],
        tasks: vec![
            task(
                "focus-day-1",
                "focus-30",
                1,
                Some(Quiz {
                    questions: vec![question(0), question(1), question(2)],
                }),
            ),
            task("focus-day-2", "focus-30", 2, None),
            task("focus-day-5", "focus-30", 5, None),
            task("sleep-day-1", "sleep-7", 1, None),
        ],
    }
}

pub fn unique_user() -> String {
    format!("test-user-{}", Uuid::new_v4())
}

pub fn token_for(app: &TestApp, user_id: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: "member".to_string(),
        exp: (now + 3600) as usize,
        iat: now as usize,
    };
    tokio_test::assert_ok!(JwtService::new(&app.config.jwt_secret).generate_token(&claims))
}

/// Sends one request through the router and decodes the JSON body
pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

pub async fn enroll(app: &TestApp, token: &str, challenge_id: &str) -> Value {
    let (status, json) = send(
        app,
        "POST",
        &format!("/api/v1/challenges/{}/enroll", challenge_id),
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}
