//! Processing log persistence
//!
//! Append-oriented: `create` writes the raw/canonical content once; every
//! later call touches only status, parsed data, attempts and error columns.

use chrono::{DateTime, Utc};
use lmp_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::{EmailEvent, ProcessingLogEntry, ProcessingStatus};

/// Insert a new pending log row for a normalized event. Returns the log id
/// the webhook response reports as `processing_id`.
pub async fn create(
    pool: &SqlitePool,
    event: &EmailEvent,
    provider: &str,
    webhook_id: Option<&str>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let event_json = serde_json::to_string(event)
        .map_err(|e| Error::Internal(format!("Failed to serialize event: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO processing_log (
            id, webhook_id, provider, campaign_id, campaign_name, campaign_type,
            sender_email, recipient_email, subject, raw_content, raw_html,
            event_json, status, attempt_count, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(webhook_id)
    .bind(provider)
    .bind(&event.campaign.id)
    .bind(&event.campaign.name)
    .bind(&event.campaign.campaign_type)
    .bind(&event.email.from)
    .bind(&event.email.to)
    .bind(&event.email.subject)
    .bind(&event.email.content.text)
    .bind(&event.email.content.html)
    .bind(&event_json)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn fetch(pool: &SqlitePool, id: Uuid) -> Result<Option<ProcessingLogEntry>> {
    let row = sqlx::query("SELECT * FROM processing_log WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(row_to_entry).transpose()
}

/// All rows currently in the given status, oldest first. The startup rescan
/// uses this to resume interrupted retries.
pub async fn fetch_by_status(
    pool: &SqlitePool,
    status: ProcessingStatus,
) -> Result<Vec<ProcessingLogEntry>> {
    let rows = sqlx::query("SELECT * FROM processing_log WHERE status = ? ORDER BY created_at")
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_entry).collect()
}

/// Mark a row parsed with its extraction output and confidence.
pub async fn mark_parsed(
    pool: &SqlitePool,
    id: Uuid,
    parsed_json: &str,
    confidence: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE processing_log
        SET status = 'parsed', parsed_data = ?, confidence = ?, error_message = NULL,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(parsed_json)
    .bind(confidence)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Store extraction output without changing status. Used for review-queued
/// rows, which stay `pending` until a human (or the auto-approve timer)
/// commits them.
pub async fn record_extraction(
    pool: &SqlitePool,
    id: Uuid,
    parsed_json: &str,
    confidence: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE processing_log
        SET parsed_data = ?, confidence = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(parsed_json)
    .bind(confidence)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a row retrying with a human-readable reason; records the attempt
/// count so retry state survives a process restart.
pub async fn mark_retrying(pool: &SqlitePool, id: Uuid, attempt: i64, reason: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE processing_log
        SET status = 'retrying', attempt_count = ?, error_message = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(attempt)
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, id: Uuid, error: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE processing_log
        SET status = 'failed', error_message = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(error)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_entry(row: SqliteRow) -> Result<ProcessingLogEntry> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;

    Ok(ProcessingLogEntry {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Bad log id {}: {}", id, e)))?,
        webhook_id: row.try_get("webhook_id")?,
        provider: row.try_get("provider")?,
        campaign_id: row.try_get("campaign_id")?,
        campaign_name: row.try_get("campaign_name")?,
        campaign_type: row.try_get("campaign_type")?,
        sender_email: row.try_get("sender_email")?,
        recipient_email: row.try_get("recipient_email")?,
        subject: row.try_get("subject")?,
        raw_content: row.try_get("raw_content")?,
        raw_html: row.try_get("raw_html")?,
        event_json: row.try_get("event_json")?,
        parsed_data: row.try_get("parsed_data")?,
        confidence: row.try_get("confidence")?,
        status: ProcessingStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown processing status: {}", status)))?,
        attempt_count: row.try_get("attempt_count")?,
        error_message: row.try_get("error_message")?,
        created_at: parse_ts(row.try_get("created_at")?)?,
        updated_at: parse_ts(row.try_get("updated_at")?)?,
    })
}

pub(crate) fn parse_ts(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp {}: {}", raw, e)))
}
