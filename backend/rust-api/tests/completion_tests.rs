mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use challenges_api::models::progress::UserProgress;

async fn complete(
    app: &common::TestApp,
    token: &str,
    task_id: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    common::send(
        app,
        "POST",
        &format!("/api/v1/tasks/{}/complete", task_id),
        Some(token),
        body,
    )
    .await
}

/// Enrolled user who last completed `completed_days` some hours ago
async fn seed_progress(
    app: &common::TestApp,
    user_id: &str,
    completed_days: u32,
    streak_count: u32,
    hours_ago: i64,
) {
    let now = Utc::now();
    let mut progress = UserProgress::new(user_id, "focus-30", now - Duration::days(10));
    progress.completed_days = completed_days;
    progress.streak_count = streak_count;
    progress.last_activity_date = Some(now - Duration::hours(hours_ago));
    app.store.put_progress(progress).await;
}

#[tokio::test]
async fn test_complete_first_day() {
    let app = common::create_test_app().await;
    let user_id = common::unique_user();
    let token = common::token_for(&app, &user_id);
    common::enroll(&app, &token, "focus-30").await;

    let (status, json) = complete(&app, &token, "focus-day-1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["submission"]["status"], "completed");
    assert_eq!(json["submission"]["task_id"], "focus-day-1");
    assert_eq!(json["progress"]["completed_days"], 1);
    assert_eq!(json["progress"]["streak_count"], 1);
    assert!(json["progress"]["last_activity_date"].is_string());
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let (_, first) = complete(&app, &token, "focus-day-1", None).await;
    let (status, second) = complete(&app, &token, "focus-day-1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["submission"]["id"], second["submission"]["id"]);
    assert_eq!(
        first["submission"]["submitted_at"],
        second["submission"]["submitted_at"]
    );
    assert_eq!(second["progress"]["completed_days"], 1);
    assert_eq!(second["progress"]["streak_count"], 1);
}

#[tokio::test]
async fn test_complete_without_enrollment_writes_nothing() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());

    let (status, json) = complete(&app, &token, "focus-day-1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "not_enrolled");

    let (status, _) = common::send(
        &app,
        "GET",
        "/api/v1/tasks/focus-day-1/submission",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_unknown_task() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let (status, json) = complete(&app, &token, "no-such-task", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_streak_continues_within_window() {
    let app = common::create_test_app().await;
    let user_id = common::unique_user();
    let token = common::token_for(&app, &user_id);
    seed_progress(&app, &user_id, 1, 3, 30).await;

    let (status, json) = complete(&app, &token, "focus-day-2", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["progress"]["completed_days"], 2);
    assert_eq!(json["progress"]["streak_count"], 4);
}

#[tokio::test]
async fn test_streak_resets_after_window() {
    let app = common::create_test_app().await;
    let user_id = common::unique_user();
    let token = common::token_for(&app, &user_id);
    seed_progress(&app, &user_id, 1, 3, 50).await;

    let (_, json) = complete(&app, &token, "focus-day-2", None).await;

    assert_eq!(json["progress"]["completed_days"], 2);
    assert_eq!(json["progress"]["streak_count"], 1);
}

#[tokio::test]
async fn test_skipping_days_jumps_progress() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let (_, json) = complete(&app, &token, "focus-day-5", None).await;
    assert_eq!(json["progress"]["completed_days"], 5);

    // Lower day is recorded but does not move progress back or bump the streak
    let (status, json) = complete(&app, &token, "focus-day-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["submission"]["status"], "completed");
    assert_eq!(json["progress"]["completed_days"], 5);
    assert_eq!(json["progress"]["streak_count"], 1);
}

#[tokio::test]
async fn test_completion_grades_quiz_and_keeps_metadata_advisory() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let (status, json) = complete(
        &app,
        &token,
        "focus-day-1",
        Some(json!({
            "resources_viewed": 4,
            "learning_time_seconds": 900,
            "quiz_score": 99,
            "quiz_answers": [0, 1, 1]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["submission"]["score"], 2);
    assert_eq!(json["submission"]["metadata"]["resources_viewed"], 4);
    assert_eq!(json["submission"]["metadata"]["quiz_score"], 99);
}

#[tokio::test]
async fn test_completion_rejects_out_of_range_metadata() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let (status, json) = complete(
        &app,
        &token,
        "focus-day-1",
        Some(json!({ "learning_time_seconds": 10_000_000 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_completion_rejects_oversized_answer_list_as_grading_input() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let answers: Vec<i64> = vec![0; 257];
    let (status, json) = complete(
        &app,
        &token,
        "focus-day-1",
        Some(json!({ "quiz_answers": answers })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "grading_input_invalid");
}

#[tokio::test]
async fn test_completion_rejects_malformed_json() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());
    common::enroll(&app, &token, "focus-30").await;

    let (status, json) = complete(
        &app,
        &token,
        "focus-day-1",
        Some(json!({ "resources_viewed": "lots" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Failed to parse JSON"));
}

#[tokio::test]
async fn test_completion_requires_token() {
    let app = common::create_test_app().await;

    let (status, json) = common::send(
        &app,
        "POST",
        "/api/v1/tasks/focus-day-1/complete",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}
