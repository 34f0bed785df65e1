//! Security log: one immutable row per inbound webhook request

use chrono::Utc;
use lmp_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn record(
    pool: &SqlitePool,
    provider: &str,
    source_ip: Option<&str>,
    webhook_id: Option<&str>,
    passed: bool,
    rejection_reason: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO security_log (id, provider, source_ip, webhook_id, passed, rejection_reason, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(provider)
    .bind(source_ip)
    .bind(webhook_id)
    .bind(passed as i64)
    .bind(rejection_reason)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
