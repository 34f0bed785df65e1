//! Publisher persistence

use chrono::{DateTime, Duration, Utc};
use lmp_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::processing_log::parse_ts;
use crate::models::{AccountStatus, Publisher};

/// Insert a new shadow publisher row. Returns `None` when a shadow row for
/// this email already exists (the unique shadow index absorbed the insert),
/// which is how a concurrent commit for the same sender loses the race
/// cleanly instead of forking a sibling row.
pub async fn insert_shadow(
    pool: &SqlitePool,
    email: &str,
    contact_name: Option<&str>,
    company_name: Option<&str>,
    confidence: f64,
    source: &str,
) -> Result<Option<Uuid>> {
    let id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO publishers (
            id, email, contact_name, company_name, account_status,
            claim_attempts, confidence, source, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 'shadow', 0, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(email)
    .bind(contact_name)
    .bind(company_name)
    .bind(confidence)
    .bind(source)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(id))
}

/// Exact-email lookup restricted to the given account statuses.
pub async fn find_by_email_in_statuses(
    pool: &SqlitePool,
    email: &str,
    statuses: &[AccountStatus],
) -> Result<Option<Publisher>> {
    // Statuses are a closed enum, safe to splice as quoted literals.
    let list = statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT * FROM publishers WHERE email = ? COLLATE NOCASE AND account_status IN ({}) LIMIT 1",
        list
    );

    let row = sqlx::query(&sql).bind(email).fetch_optional(pool).await?;
    row.map(row_to_publisher).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Publisher>> {
    let row = sqlx::query("SELECT * FROM publishers WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_publisher).transpose()
}

pub async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Publisher>> {
    let row = sqlx::query("SELECT * FROM publishers WHERE invitation_token = ? LIMIT 1")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_publisher).transpose()
}

/// Overwrite contact/company/confidence. Callers gate this on confidence;
/// the row itself does not.
pub async fn update_contact_fields(
    pool: &SqlitePool,
    id: Uuid,
    contact_name: Option<&str>,
    company_name: Option<&str>,
    confidence: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE publishers
        SET contact_name = ?, company_name = ?, confidence = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(contact_name)
    .bind(company_name)
    .bind(confidence)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Count one failed claim attempt.
pub async fn record_failed_claim_attempt(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE publishers
        SET claim_attempts = claim_attempts + 1, last_claim_attempt_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Reset the lockout counter once the window has elapsed.
pub async fn reset_claim_attempts(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE publishers SET claim_attempts = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Finalize activation. The WHERE clause re-checks `account_status =
/// 'shadow'` at commit time, so of two concurrent claims with the same
/// token exactly one sees `true` here.
pub async fn activate(
    pool: &SqlitePool,
    id: Uuid,
    password_hash: &str,
    password_salt: &str,
    contact_name: &str,
    company_name: Option<&str>,
) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE publishers
        SET account_status = 'active',
            password_hash = ?, password_salt = ?,
            contact_name = ?, company_name = COALESCE(?, company_name),
            invitation_token = NULL, invitation_expires_at = NULL,
            claim_attempts = 0, claimed_at = ?, updated_at = ?
        WHERE id = ? AND account_status = 'shadow'
        "#,
    )
    .bind(password_hash)
    .bind(password_salt)
    .bind(contact_name)
    .bind(company_name)
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Persist a freshly generated or re-sent invitation.
pub async fn set_invitation(
    pool: &SqlitePool,
    id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
    sent_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE publishers
        SET invitation_token = ?, invitation_expires_at = ?, invitation_sent_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(token)
    .bind(expires_at.to_rfc3339())
    .bind(sent_at.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Shadow publishers eligible for a (re-)invitation: never invited, or last
/// invited more than `reinvite_after_days` ago. Oldest rows first.
pub async fn eligible_for_invitation(
    pool: &SqlitePool,
    reinvite_after_days: i64,
    limit: u32,
) -> Result<Vec<Publisher>> {
    let cutoff = (Utc::now() - Duration::days(reinvite_after_days)).to_rfc3339();
    let rows = sqlx::query(
        r#"
        SELECT * FROM publishers
        WHERE account_status = 'shadow'
          AND (invitation_sent_at IS NULL OR invitation_sent_at < ?)
        ORDER BY created_at
        LIMIT ?
        "#,
    )
    .bind(&cutoff)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_publisher).collect()
}

/// Count all shadow publishers still eligible, ignoring the batch limit.
pub async fn count_eligible_for_invitation(
    pool: &SqlitePool,
    reinvite_after_days: i64,
) -> Result<i64> {
    let cutoff = (Utc::now() - Duration::days(reinvite_after_days)).to_rfc3339();
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM publishers
        WHERE account_status = 'shadow'
          AND (invitation_sent_at IS NULL OR invitation_sent_at < ?)
        "#,
    )
    .bind(&cutoff)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub(crate) fn row_to_publisher(row: SqliteRow) -> Result<Publisher> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("account_status")?;

    Ok(Publisher {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Bad publisher id {}: {}", id, e)))?,
        email: row.try_get("email")?,
        contact_name: row.try_get("contact_name")?,
        company_name: row.try_get("company_name")?,
        account_status: AccountStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown account status: {}", status)))?,
        invitation_token: row.try_get("invitation_token")?,
        invitation_expires_at: opt_ts(row.try_get("invitation_expires_at")?)?,
        invitation_sent_at: opt_ts(row.try_get("invitation_sent_at")?)?,
        claim_attempts: row.try_get("claim_attempts")?,
        last_claim_attempt_at: opt_ts(row.try_get("last_claim_attempt_at")?)?,
        claimed_at: opt_ts(row.try_get("claimed_at")?)?,
        confidence: row.try_get("confidence")?,
        source: row.try_get("source")?,
        created_at: parse_ts(row.try_get("created_at")?)?,
        updated_at: parse_ts(row.try_get("updated_at")?)?,
    })
}

fn opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}
