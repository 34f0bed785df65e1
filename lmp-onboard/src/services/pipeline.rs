//! Async processing pipeline
//!
//! Everything after the webhook response: extraction, confidence routing,
//! commit or review-queue, and the bounded-backoff retry loop. Retry state
//! lives in the processing_log row (attempt count + persisted canonical
//! event), never in process memory alone; `resume_pending` re-scans those
//! rows on startup so a restart picks up where the dead process stopped.
//!
//! Status discipline: a row becomes `parsed` only when a publisher write
//! was committed (and its automation_log row exists). Review-queued rows
//! keep status `pending` with the extraction stored alongside, which is
//! exactly the "queued iff not committed" invariant.

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{processing_log, review_queue};
use crate::error::PipelineError;
use crate::models::{EmailEvent, ExtractionRequest, ProcessingStatus};
use crate::services::confidence_router::{self, RoutingDecision};
use crate::services::publisher_writer;
use crate::AppState;

/// Review-queue reason used when retries are exhausted.
const REASON_PROCESSING_FAILED: &str = "processing_failed";

/// Fire-and-forget dispatch used by the webhook handler after the log row
/// is persisted.
pub fn dispatch(state: AppState, log_id: Uuid) {
    tokio::spawn(run_with_retry(state, log_id, 1));
}

/// Re-dispatch every row a previous process left in `retrying` or
/// `pending`. Called once at startup; returns how many were resumed.
pub async fn resume_pending(state: &AppState) -> lmp_common::Result<usize> {
    let mut resumed = 0;

    for status in [ProcessingStatus::Retrying, ProcessingStatus::Pending] {
        for entry in processing_log::fetch_by_status(&state.db, status).await? {
            // Review-queued rows stay pending but are in human hands now;
            // re-extracting them could auto-commit past the queued review.
            if review_queue::count_for_log(&state.db, entry.id).await? > 0 {
                continue;
            }
            // A retrying row has already burned `attempt_count` attempts.
            let next_attempt = (entry.attempt_count as u32) + 1;
            info!(
                "Resuming log {} (status {}, next attempt {})",
                entry.id,
                status.as_str(),
                next_attempt
            );
            tokio::spawn(run_with_retry(state.clone(), entry.id, next_attempt));
            resumed += 1;
        }
    }

    Ok(resumed)
}

/// Retry loop: attempt, back off per policy, divert to review on
/// exhaustion. Never drops an email silently.
pub async fn run_with_retry(state: AppState, log_id: Uuid, first_attempt: u32) {
    let policy = state.config.retry.clone();
    let mut attempt = first_attempt.max(1);

    loop {
        match process_once(&state, log_id).await {
            Ok(()) => return,
            Err(e) => {
                let reason = e.to_string();
                if attempt >= policy.max_attempts {
                    error!(
                        "Log {} failed after {} attempts: {}",
                        log_id, attempt, reason
                    );
                    if let Err(db_err) = processing_log::mark_failed(&state.db, log_id, &reason).await
                    {
                        error!("Failed to mark log {} failed: {}", log_id, db_err);
                    }
                    // Exhausted emails always land in front of a human.
                    if let Err(db_err) = review_queue::enqueue(
                        &state.db,
                        log_id,
                        REASON_PROCESSING_FAILED,
                        "high",
                        None,
                    )
                    .await
                    {
                        error!("Failed to enqueue failed log {}: {}", log_id, db_err);
                    }
                    return;
                }

                let delay = policy.delay_secs(attempt);
                warn!(
                    "Log {} attempt {} failed ({}), retrying in {}s",
                    log_id, attempt, reason, delay
                );
                if let Err(db_err) = processing_log::mark_retrying(
                    &state.db,
                    log_id,
                    attempt as i64,
                    &format!("attempt {} failed: {}", attempt, reason),
                )
                .await
                {
                    error!("Failed to mark log {} retrying: {}", log_id, db_err);
                }

                tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                attempt += 1;
            }
        }
    }
}

/// One processing attempt, reconstructed entirely from the persisted row.
pub async fn process_once(state: &AppState, log_id: Uuid) -> Result<(), PipelineError> {
    let entry = processing_log::fetch(&state.db, log_id)
        .await
        .map_err(|e| PipelineError::Other(e.to_string()))?
        .ok_or_else(|| PipelineError::Other(format!("log row {} not found", log_id)))?;

    // Duplicate delivery or a racing resume: already handled.
    if entry.status == ProcessingStatus::Parsed {
        return Ok(());
    }

    let event: EmailEvent = serde_json::from_str(&entry.event_json)
        .map_err(|e| PipelineError::Other(format!("corrupt event_json: {}", e)))?;

    let request = ExtractionRequest {
        from: event.email.from.clone(),
        subject: event.email.subject.clone(),
        content: event.email.content.text.clone(),
        html_content: event.email.content.html.clone(),
        campaign_type: event.campaign.campaign_type.clone(),
        original_website: None,
    };

    let extraction = state
        .extractor
        .extract(&request)
        .await
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;

    let parsed_json = serde_json::to_string(&extraction)
        .map_err(|e| PipelineError::Other(format!("unserializable extraction: {}", e)))?;

    let decision = confidence_router::route(extraction.overall_confidence, &state.config.thresholds);
    info!(
        "Log {} confidence {:.2} → {}",
        log_id,
        extraction.overall_confidence,
        decision.as_str()
    );

    match decision {
        RoutingDecision::AutoProcess => {
            let report = publisher_writer::commit(
                &state.db,
                log_id,
                &event.email.from,
                &extraction,
                &state.config.thresholds,
            )
            .await
            .map_err(|e| PipelineError::Other(e.to_string()))?;

            processing_log::mark_parsed(
                &state.db,
                log_id,
                &parsed_json,
                extraction.overall_confidence,
            )
            .await
            .map_err(|e| PipelineError::Other(e.to_string()))?;

            info!(
                "Log {} committed to publisher {} ({})",
                log_id,
                report.publisher_id,
                if report.created { "created" } else { "updated" }
            );
        }
        RoutingDecision::TimedReview
        | RoutingDecision::ManualReview
        | RoutingDecision::LowConfidence => {
            processing_log::record_extraction(
                &state.db,
                log_id,
                &parsed_json,
                extraction.overall_confidence,
            )
            .await
            .map_err(|e| PipelineError::Other(e.to_string()))?;

            let auto_approve_at =
                confidence_router::auto_approve_delay(decision, &state.config.thresholds)
                    .map(|delay| Utc::now() + delay);

            review_queue::enqueue(
                &state.db,
                log_id,
                decision.queue_reason().unwrap_or("review"),
                decision.queue_priority(),
                auto_approve_at,
            )
            .await
            .map_err(|e| PipelineError::Other(e.to_string()))?;

            info!("Log {} queued for review ({})", log_id, decision.as_str());
        }
    }

    Ok(())
}
