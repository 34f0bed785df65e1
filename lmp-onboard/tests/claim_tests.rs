//! Integration tests for the claim portal endpoints.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt;
use uuid::Uuid;

use common::{test_state, StubBehavior};
use lmp_onboard::config::OnboardConfig;
use lmp_onboard::db::{offerings, publishers, websites};

async fn seed_invited_shadow(pool: &SqlitePool, token: &str, ttl_days: i64) -> Uuid {
    let id = publishers::insert_shadow(
        pool,
        "pub@example.com",
        Some("Pat Doe"),
        Some("Example Media"),
        0.9,
        "email_extraction",
    )
    .await
    .unwrap()
    .unwrap();
    publishers::set_invitation(
        pool,
        id,
        token,
        Utc::now() + Duration::days(ttl_days),
        Utc::now(),
    )
    .await
    .unwrap();

    // Shadow inventory so a successful claim has something to migrate
    let website_id = websites::find_or_create(pool, "example.com", "email_extraction")
        .await
        .unwrap();
    websites::link_publisher(pool, id, website_id).await.unwrap();
    let offering_id = offerings::upsert(pool, id, "guest_post", 30000, "USD", Some(2), 0.9)
        .await
        .unwrap();
    offerings::link_website(pool, offering_id, website_id, true)
        .await
        .unwrap();

    id
}

async fn get_preview(app: &axum::Router, token: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/claim?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_claim(app: &axum::Router, payload: &Value) -> (StatusCode, Value, Option<String>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/claim")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body, retry_after)
}

#[tokio::test]
async fn preview_shows_redacted_publisher_details() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    seed_invited_shadow(&state.db, "tok-preview", 30).await;
    let app = lmp_onboard::build_router(state);

    let (status, body) = get_preview(&app, "tok-preview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "pub@example.com");
    assert_eq!(body["contactName"], "Pat Doe");
    assert_eq!(body["companyName"], "Example Media");
    assert_eq!(body["source"], "email_extraction");
    // No credential or token material in the preview
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("invitationToken").is_none());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let app = lmp_onboard::build_router(state);

    let (status, body) = get_preview(&app, "no-such-token").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn expired_token_is_gone() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    seed_invited_shadow(&state.db, "tok-expired", -1).await;
    let app = lmp_onboard::build_router(state);

    let (status, body) = get_preview(&app, "tok-expired").await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "TOKEN_EXPIRED");

    let (status, _, _) = post_claim(
        &app,
        &json!({
            "token": "tok-expired",
            "password": "hunter2hunter2",
            "contactName": "Pat Doe"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn successful_claim_activates_and_migrates() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let pool = state.db.clone();
    let id = seed_invited_shadow(&pool, "tok-claim", 30).await;
    let app = lmp_onboard::build_router(state);

    let (status, body, _) = post_claim(
        &app,
        &json!({
            "token": "tok-claim",
            "password": "hunter2hunter2",
            "contactName": "Pat D. Doe",
            "companyName": "Example Media LLC"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["redirectUrl"], "/publisher/dashboard");
    assert_eq!(body["migration"]["websitesMigrated"], 1);
    assert_eq!(body["migration"]["offeringsActivated"], 1);

    let (account_status, token, contact): (String, Option<String>, String) = sqlx::query_as(
        "SELECT account_status, invitation_token, contact_name FROM publishers WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(account_status, "active");
    assert!(token.is_none(), "token is single-use");
    assert_eq!(contact, "Pat D. Doe");

    let website_status: String = sqlx::query_scalar("SELECT status FROM websites")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(website_status, "active");
    let offering_status: String = sqlx::query_scalar("SELECT status FROM publisher_offerings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(offering_status, "active");
}

#[tokio::test]
async fn claimed_token_cannot_be_replayed() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    seed_invited_shadow(&state.db, "tok-once", 30).await;
    let app = lmp_onboard::build_router(state);

    let payload = json!({
        "token": "tok-once",
        "password": "hunter2hunter2",
        "contactName": "Pat Doe"
    });
    let (first, _, _) = post_claim(&app, &payload).await;
    assert_eq!(first, StatusCode::OK);

    let (second, _, _) = post_claim(&app, &payload).await;
    assert_eq!(second, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn short_password_is_a_validation_error() {
    let state = test_state(OnboardConfig::default(), StubBehavior::Fail).await;
    let pool = state.db.clone();
    let id = seed_invited_shadow(&pool, "tok-weak", 30).await;
    let app = lmp_onboard::build_router(state);

    let (status, body, _) = post_claim(
        &app,
        &json!({
            "token": "tok-weak",
            "password": "short",
            "contactName": "Pat Doe"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Failed attempt is counted and audited
    let attempts: i64 = sqlx::query_scalar("SELECT claim_attempts FROM publishers WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(attempts, 1);
    let history: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM claim_history WHERE publisher_id = ? AND success = 0",
    )
    .bind(id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(history, 1);
}

#[tokio::test]
async fn repeated_failures_lock_the_token() {
    let mut config = OnboardConfig::default();
    config.claim.max_attempts = 2;
    config.claim.lockout_minutes = 30;
    let state = test_state(config, StubBehavior::Fail).await;
    seed_invited_shadow(&state.db, "tok-locked", 30).await;
    let app = lmp_onboard::build_router(state);

    let bad = json!({
        "token": "tok-locked",
        "password": "nope",
        "contactName": "Pat Doe"
    });
    for _ in 0..2 {
        let (status, _, _) = post_claim(&app, &bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // Even a well-formed submission bounces while locked out
    let (status, body, retry_after) = post_claim(
        &app,
        &json!({
            "token": "tok-locked",
            "password": "hunter2hunter2",
            "contactName": "Pat Doe"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "CLAIM_LOCKED");
    let secs: u64 = retry_after.expect("Retry-After header").parse().unwrap();
    assert!(secs > 0 && secs <= 30 * 60);
}
