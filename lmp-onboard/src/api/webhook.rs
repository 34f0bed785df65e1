//! Inbound email webhook endpoint
//!
//! `POST /webhooks/:provider` does only the synchronous part (security
//! gate, normalization, log-row creation) and answers with a tracking id
//! in milliseconds. The extraction pipeline runs detached; its input is the
//! persisted canonical payload, not this request.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::{normalizer, pipeline, security_gate};
use crate::AppState;

const HDR_SIGNATURE: &str = "x-webhook-signature";
const HDR_WEBHOOK_ID: &str = "x-webhook-id";
const HDR_TIMESTAMP: &str = "x-webhook-timestamp";
const HDR_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub webhook_id: Option<String>,
    pub processing_id: String,
    pub estimated_completion: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookHealthResponse {
    pub status: String,
    pub webhook: String,
    pub version: String,
    pub timestamp: String,
}

/// POST /webhooks/:provider
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let meta = security_gate::InboundMeta {
        signature: header_string(&headers, HDR_SIGNATURE),
        webhook_id: header_string(&headers, HDR_WEBHOOK_ID),
        timestamp: header_string(&headers, HDR_TIMESTAMP),
        // The service sits behind the platform ingress; the proxy's
        // first forwarded hop is the caller.
        source_ip: header_string(&headers, HDR_FORWARDED_FOR)
            .and_then(|v| v.split(',').next().map(str::trim).map(str::to_string))
            .and_then(|ip| ip.parse().ok()),
    };

    security_gate::verify_and_log(&state.db, &provider, &meta, &body, &state.config.security)
        .await
        .map_err(|rejection| {
            if rejection.is_forbidden() {
                ApiError::Forbidden(rejection.to_string())
            } else {
                ApiError::Unauthorized(rejection.to_string())
            }
        })?;

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed JSON payload: {}", e)))?;

    let event = normalizer::normalize(&provider, &payload).map_err(|e| match e {
        lmp_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
        other => ApiError::Common(other),
    })?;

    let log_id = crate::db::processing_log::create(
        &state.db,
        &event,
        &provider,
        meta.webhook_id.as_deref(),
    )
    .await?;

    info!(
        "Webhook {} from {} accepted as log {}",
        provider, event.email.from, log_id
    );

    // Canonical payload is on disk; processing continues without us.
    pipeline::dispatch(state.clone(), log_id);

    Ok(Json(WebhookResponse {
        success: true,
        message: "Email accepted for processing".to_string(),
        webhook_id: meta.webhook_id,
        processing_id: log_id.to_string(),
        estimated_completion: (Utc::now() + Duration::seconds(30)).to_rfc3339(),
    }))
}

/// GET /webhooks/:provider, the provider-facing health check
pub async fn webhook_health(Path(provider): Path<String>) -> Json<WebhookHealthResponse> {
    Json(WebhookHealthResponse {
        status: "ok".to_string(),
        webhook: provider,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/webhooks/:provider",
        post(receive_webhook).get(webhook_health),
    )
}
