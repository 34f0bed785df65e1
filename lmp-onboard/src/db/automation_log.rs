//! Automation log: append-only audit of every automated publisher write
//!
//! A processing-log row may only be marked "parsed" in the same flow that
//! wrote one of these; a parsed email with no automation record is a bug.

use chrono::Utc;
use lmp_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn record(
    pool: &SqlitePool,
    publisher_id: Option<Uuid>,
    log_id: Option<Uuid>,
    action: &str,
    match_method: Option<&str>,
    confidence: f64,
    metadata: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO automation_log (id, publisher_id, log_id, action, match_method, confidence, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(publisher_id.map(|id| id.to_string()))
    .bind(log_id.map(|id| id.to_string()))
    .bind(action)
    .bind(match_method)
    .bind(confidence)
    .bind(metadata.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_for_log(pool: &SqlitePool, log_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM automation_log WHERE log_id = ?")
        .bind(log_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
