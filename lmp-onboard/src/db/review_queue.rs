//! Review queue rows
//!
//! One row per log entry at most (UNIQUE(log_id)); enqueueing twice is a
//! no-op, which keeps duplicate webhook deliveries and retry exhaustion
//! from double-queueing the same email.

use chrono::{DateTime, Utc};
use lmp_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn enqueue(
    pool: &SqlitePool,
    log_id: Uuid,
    reason: &str,
    priority: &str,
    auto_approve_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO review_queue (id, log_id, reason, priority, auto_approve_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(log_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(log_id.to_string())
    .bind(reason)
    .bind(priority)
    .bind(auto_approve_at.map(|dt| dt.to_rfc3339()))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_for_log(pool: &SqlitePool, log_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_queue WHERE log_id = ?")
        .bind(log_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
