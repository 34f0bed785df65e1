//! Claim endpoints
//!
//! `GET /claim?token=` shows the redacted preview; `POST /claim` sets
//! credentials and activates. Rejections are machine-readable (404 unknown,
//! 410 expired, 429 locked with Retry-After) so the portal UI can message
//! each case distinctly.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::claim::{self, ClaimError, ClaimPreview, ClaimSubmission};
use crate::services::migration::MigrationReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ClaimQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub token: String,
    pub password: String,
    pub contact_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub success: bool,
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationReport>,
}

/// GET /claim?token=
pub async fn claim_preview(
    State(state): State<AppState>,
    Query(query): Query<ClaimQuery>,
) -> ApiResult<Json<ClaimPreview>> {
    let preview = claim::preview(&state.db, &state.config.claim, &query.token)
        .await
        .map_err(map_claim_error)?;
    Ok(Json(preview))
}

/// POST /claim
pub async fn claim_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<Json<ClaimResponse>> {
    let submission = ClaimSubmission {
        token: request.token,
        password: request.password,
        contact_name: request.contact_name,
        company_name: request.company_name,
        ip: header_string(&headers, "x-forwarded-for"),
        user_agent: header_string(&headers, "user-agent"),
    };

    let outcome = claim::submit(&state.db, &state.config.claim, submission)
        .await
        .map_err(map_claim_error)?;

    Ok(Json(ClaimResponse {
        success: true,
        redirect_url: state.config.claim.redirect_url.clone(),
        migration: Some(outcome.migration),
    }))
}

fn map_claim_error(err: ClaimError) -> ApiError {
    match err {
        ClaimError::Invalid => ApiError::NotFound("Unknown claim token".to_string()),
        ClaimError::Expired => ApiError::Gone("Invitation token expired".to_string()),
        ClaimError::Locked { retry_after_secs } => ApiError::Locked { retry_after_secs },
        ClaimError::Validation(msg) => ApiError::BadRequest(msg),
        ClaimError::Internal(e) => ApiError::Common(e),
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/claim", get(claim_preview).post(claim_submit))
}
