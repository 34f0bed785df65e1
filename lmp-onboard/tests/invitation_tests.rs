//! HTTP-level tests for the invitation endpoints.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use common::{test_state, StubBehavior};
use lmp_onboard::config::OnboardConfig;
use lmp_onboard::db::publishers;

async fn post_json(app: &axum::Router, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method("POST").uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

#[tokio::test]
async fn single_invitation_sets_token_and_audits() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let pool = state.db.clone();
    let id = publishers::insert_shadow(
        &pool,
        "pub@example.com",
        Some("Pat Doe"),
        None,
        0.9,
        "email_extraction",
    )
    .await
    .unwrap()
    .unwrap();
    let app = lmp_onboard::build_router(state);

    let (status, body) =
        post_json(&app, &format!("/publishers/{}/invitation", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");

    let (token, expires): (Option<String>, Option<String>) = sqlx::query_as(
        "SELECT invitation_token, invitation_expires_at FROM publishers WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(token.is_some());
    assert!(expires.is_some());

    let audited: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM automation_log WHERE action = 'send_invitation'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(audited, 1);
}

#[tokio::test]
async fn resend_inside_cooldown_is_skipped() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let pool = state.db.clone();
    let id = publishers::insert_shadow(&pool, "pub@example.com", None, None, 0.9, "email_extraction")
        .await
        .unwrap()
        .unwrap();
    let app = lmp_onboard::build_router(state);

    let uri = format!("/publishers/{}/invitation", id);
    let (_, first) = post_json(&app, &uri, None).await;
    assert_eq!(first["status"], "sent");

    let (status, second) = post_json(&app, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "skipped_recently_invited");
}

#[tokio::test]
async fn inviting_an_unknown_publisher_is_not_found() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let app = lmp_onboard::build_router(state);

    let (status, _) =
        post_json(&app, &format!("/publishers/{}/invitation", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_send_covers_all_eligible_shadow_publishers() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let pool = state.db.clone();
    for i in 0..3 {
        publishers::insert_shadow(
            &pool,
            &format!("pub{}@example.com", i),
            None,
            None,
            0.9,
            "email_extraction",
        )
        .await
        .unwrap()
        .unwrap();
    }
    let app = lmp_onboard::build_router(state);

    let (status, body) = post_json(&app, "/invitations/bulk", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], 3);
    assert_eq!(body["failed"], 0);

    let invited: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM publishers WHERE invitation_token IS NOT NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(invited, 3);
}
