//! Claim history: append-only audit of every claim attempt

use chrono::Utc;
use lmp_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub async fn record(
    pool: &SqlitePool,
    publisher_id: Uuid,
    action: &str,
    success: bool,
    failure_reason: Option<&str>,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO claim_history (id, publisher_id, action, success, failure_reason, ip, user_agent, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(publisher_id.to_string())
    .bind(action)
    .bind(success as i64)
    .bind(failure_reason)
    .bind(ip)
    .bind(user_agent)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
