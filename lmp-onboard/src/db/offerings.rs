//! Publisher offering rows and offering↔website relationships

use chrono::Utc;
use lmp_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Upsert an offering keyed by (publisher_id, offering_type). Price,
/// turnaround and confidence are replaced on conflict; the caller decides
/// whether its confidence is good enough to call this at all.
pub async fn upsert(
    pool: &SqlitePool,
    publisher_id: Uuid,
    offering_type: &str,
    base_price_cents: i64,
    currency: &str,
    turnaround_days: Option<i64>,
    confidence: f64,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO publisher_offerings (
            id, publisher_id, offering_type, base_price, currency,
            turnaround_days, availability, status, confidence, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, 1, 'shadow', ?, ?)
        ON CONFLICT(publisher_id, offering_type) DO UPDATE SET
            base_price = excluded.base_price,
            currency = excluded.currency,
            turnaround_days = excluded.turnaround_days,
            confidence = excluded.confidence,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id.to_string())
    .bind(publisher_id.to_string())
    .bind(offering_type)
    .bind(base_price_cents)
    .bind(currency)
    .bind(turnaround_days)
    .bind(confidence)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    // The upsert may have kept the existing row id.
    find_id(pool, publisher_id, offering_type).await?.ok_or_else(|| {
        lmp_common::Error::Internal(format!(
            "Offering {}/{} vanished during upsert",
            publisher_id, offering_type
        ))
    })
}

pub async fn find_id(
    pool: &SqlitePool,
    publisher_id: Uuid,
    offering_type: &str,
) -> Result<Option<Uuid>> {
    let row = sqlx::query(
        "SELECT id FROM publisher_offerings WHERE publisher_id = ? AND offering_type = ?",
    )
    .bind(publisher_id.to_string())
    .bind(offering_type)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.try_get("id")?;
            Ok(Some(Uuid::parse_str(&id).map_err(|e| {
                lmp_common::Error::Internal(format!("Bad offering id {}: {}", id, e))
            })?))
        }
        None => Ok(None),
    }
}

/// Stored confidence of an existing offering, if any. Gates field updates.
pub async fn stored_confidence(
    pool: &SqlitePool,
    publisher_id: Uuid,
    offering_type: &str,
) -> Result<Option<f64>> {
    let confidence: Option<Option<f64>> = sqlx::query_scalar(
        "SELECT confidence FROM publisher_offerings WHERE publisher_id = ? AND offering_type = ?",
    )
    .bind(publisher_id.to_string())
    .bind(offering_type)
    .fetch_optional(pool)
    .await?;

    Ok(confidence.flatten())
}

/// Idempotent offering↔website relationship.
pub async fn link_website(
    pool: &SqlitePool,
    offering_id: Uuid,
    website_id: Uuid,
    is_primary: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO offering_websites (offering_id, website_id, is_primary)
        VALUES (?, ?, ?)
        ON CONFLICT(offering_id, website_id) DO NOTHING
        "#,
    )
    .bind(offering_id.to_string())
    .bind(website_id.to_string())
    .bind(is_primary as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Shadow-status offering ids of a publisher (migration input).
pub async fn shadow_offerings_of(pool: &SqlitePool, publisher_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT id FROM publisher_offerings WHERE publisher_id = ? AND status = 'shadow'",
    )
    .bind(publisher_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            Uuid::parse_str(&id)
                .map_err(|e| lmp_common::Error::Internal(format!("Bad offering id {}: {}", id, e)))
        })
        .collect()
}

pub async fn mark_active(pool: &SqlitePool, offering_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE publisher_offerings SET status = 'active', updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(offering_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
