//! Website rows and publisher↔website links

use chrono::Utc;
use lmp_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Find a website by normalized domain, or create it shadow-status.
pub async fn find_or_create(pool: &SqlitePool, domain: &str, source: &str) -> Result<Uuid> {
    if let Some(id) = find_by_domain(pool, domain).await? {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    // Concurrent duplicate insert loses on the UNIQUE(domain) constraint;
    // re-read instead of failing.
    let result = sqlx::query(
        "INSERT OR IGNORE INTO websites (id, domain, source, status, created_at) VALUES (?, ?, ?, 'shadow', ?)",
    )
    .bind(id.to_string())
    .bind(domain)
    .bind(source)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        Ok(id)
    } else {
        find_by_domain(pool, domain).await?.ok_or_else(|| {
            lmp_common::Error::Internal(format!("Website {} vanished during insert", domain))
        })
    }
}

pub async fn find_by_domain(pool: &SqlitePool, domain: &str) -> Result<Option<Uuid>> {
    let row = sqlx::query("SELECT id FROM websites WHERE domain = ?")
        .bind(domain)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let id: String = row.try_get("id")?;
            Ok(Some(Uuid::parse_str(&id).map_err(|e| {
                lmp_common::Error::Internal(format!("Bad website id {}: {}", id, e))
            })?))
        }
        None => Ok(None),
    }
}

/// Idempotent publisher↔website link.
pub async fn link_publisher(pool: &SqlitePool, publisher_id: Uuid, website_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO publisher_websites (publisher_id, website_id, added_at)
        VALUES (?, ?, ?)
        ON CONFLICT(publisher_id, website_id) DO NOTHING
        "#,
    )
    .bind(publisher_id.to_string())
    .bind(website_id.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Publishers linked to a website, for indirect domain matching.
pub async fn linked_publisher_ids(pool: &SqlitePool, website_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT publisher_id FROM publisher_websites WHERE website_id = ? ORDER BY added_at",
    )
    .bind(website_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.try_get("publisher_id")?;
            Uuid::parse_str(&id)
                .map_err(|e| lmp_common::Error::Internal(format!("Bad publisher id {}: {}", id, e)))
        })
        .collect()
}

/// Shadow-status website ids linked to a publisher (migration input).
pub async fn shadow_websites_of(pool: &SqlitePool, publisher_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT w.id FROM websites w
        JOIN publisher_websites pw ON pw.website_id = w.id
        WHERE pw.publisher_id = ? AND w.status = 'shadow'
        "#,
    )
    .bind(publisher_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            Uuid::parse_str(&id)
                .map_err(|e| lmp_common::Error::Internal(format!("Bad website id {}: {}", id, e)))
        })
        .collect()
}

pub async fn mark_active(pool: &SqlitePool, website_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE websites SET status = 'active' WHERE id = ?")
        .bind(website_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
