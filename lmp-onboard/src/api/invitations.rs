//! Internal invitation endpoints
//!
//! Operations surface used by the admin side of the platform; not exposed
//! publicly. Single send is idempotent per the dispatcher's cooldown, bulk
//! send is bounded and rate-limited.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::invitations::{self, BulkReport, SendStatus};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub success: bool,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkInvitationRequest {
    #[serde(default)]
    pub publisher_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

/// POST /publishers/:id/invitation
pub async fn send_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvitationResponse>> {
    let status = invitations::send_invitation(
        &state.db,
        &state.config.invitations,
        state.transport.as_ref(),
        id,
    )
    .await
    .map_err(|e| match e {
        lmp_common::Error::NotFound(msg) => ApiError::NotFound(msg),
        lmp_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
        other => ApiError::Common(other),
    })?;

    Ok(Json(InvitationResponse {
        success: true,
        status: match status {
            SendStatus::Sent => "sent".to_string(),
            SendStatus::SkippedRecentlyInvited => "skipped_recently_invited".to_string(),
        },
    }))
}

/// POST /invitations/bulk
pub async fn send_bulk(
    State(state): State<AppState>,
    body: Option<Json<BulkInvitationRequest>>,
) -> ApiResult<Json<BulkReport>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let report = invitations::send_bulk_invitations(
        &state.db,
        &state.config.invitations,
        state.transport.as_ref(),
        request.publisher_ids,
        request.batch_size,
    )
    .await?;

    Ok(Json(report))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/publishers/:id/invitation", post(send_one))
        .route("/invitations/bulk", post(send_bulk))
}
