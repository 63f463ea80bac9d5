mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_enroll_creates_zeroed_progress() {
    let app = common::create_test_app().await;
    let user_id = common::unique_user();
    let token = common::token_for(&app, &user_id);

    let json = common::enroll(&app, &token, "focus-30").await;

    assert_eq!(json["user_id"], user_id.as_str());
    assert_eq!(json["challenge_id"], "focus-30");
    assert_eq!(json["completed_days"], 0);
    assert_eq!(json["streak_count"], 0);
    assert!(json["last_activity_date"].is_null());
}

#[tokio::test]
async fn test_enroll_twice_returns_same_record() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());

    let first = common::enroll(&app, &token, "focus-30").await;
    let second = common::enroll(&app, &token, "focus-30").await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["enrolled_at"], second["enrolled_at"]);
}

#[tokio::test]
async fn test_enroll_in_unknown_challenge_is_not_found() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());

    let (status, json) = common::send(
        &app,
        "POST",
        "/api/v1/challenges/does-not-exist/enroll",
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_progress_requires_enrollment() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());

    let (status, json) = common::send(
        &app,
        "GET",
        "/api/v1/challenges/focus-30/progress",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "not_enrolled");

    common::enroll(&app, &token, "focus-30").await;

    let (status, json) = common::send(
        &app,
        "GET",
        "/api/v1/challenges/focus-30/progress",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["completed_days"], 0);
}

#[tokio::test]
async fn test_enrollments_are_per_user() {
    let app = common::create_test_app().await;
    let alice = common::token_for(&app, &common::unique_user());
    let bob = common::token_for(&app, &common::unique_user());

    let a = common::enroll(&app, &alice, "sleep-7").await;
    let b = common::enroll(&app, &bob, "sleep-7").await;

    assert_ne!(a["id"], b["id"]);
}

#[tokio::test]
async fn test_challenge_catalog_hides_quiz_answers() {
    let app = common::create_test_app().await;
    let token = common::token_for(&app, &common::unique_user());

    let (status, json) = common::send(&app, "GET", "/api/v1/challenges", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["challenges"].as_array().unwrap().len(), 2);

    let (status, json) =
        common::send(&app, "GET", "/api/v1/challenges/focus-30", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["duration"], 30);

    let tasks = json["tasks"].as_array().unwrap();
    let days: Vec<u64> = tasks
        .iter()
        .map(|t| t["day_number"].as_u64().unwrap())
        .collect();
    assert_eq!(days, vec![1, 2, 5]);

    let question = &tasks[0]["quiz"]["questions"][0];
    assert!(question.get("correct_answer").is_none());
    assert_eq!(question["options"].as_array().unwrap().len(), 3);
}
