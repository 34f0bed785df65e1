//! Database access for lmp-onboard
//!
//! SQLite via sqlx. Ids are TEXT UUIDs, timestamps are RFC3339 TEXT.
//! Tables are created idempotently at pool init.

pub mod automation_log;
pub mod claim_history;
pub mod offerings;
pub mod processing_log;
pub mod publishers;
pub mod review_queue;
pub mod security_log;
pub mod websites;

use lmp_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and run table migrations.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create onboarding tables if they don't exist.
///
/// Also used by integration tests against `sqlite::memory:` pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_log (
            id TEXT PRIMARY KEY,
            webhook_id TEXT,
            provider TEXT NOT NULL,
            campaign_id TEXT,
            campaign_name TEXT,
            campaign_type TEXT,
            sender_email TEXT NOT NULL,
            recipient_email TEXT,
            subject TEXT,
            raw_content TEXT NOT NULL,
            raw_html TEXT,
            event_json TEXT NOT NULL,
            parsed_data TEXT,
            confidence REAL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempt_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS security_log (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            source_ip TEXT,
            webhook_id TEXT,
            passed INTEGER NOT NULL,
            rejection_reason TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publishers (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            contact_name TEXT,
            company_name TEXT,
            account_status TEXT NOT NULL DEFAULT 'shadow',
            password_hash TEXT,
            password_salt TEXT,
            invitation_token TEXT,
            invitation_expires_at TEXT,
            invitation_sent_at TEXT,
            claim_attempts INTEGER NOT NULL DEFAULT 0,
            last_claim_attempt_at TEXT,
            claimed_at TEXT,
            confidence REAL,
            source TEXT NOT NULL DEFAULT 'email_extraction',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one shadow row and one claimed/unclaimed row per email. The
    // shadow index is what makes concurrent writer commits for the same
    // sender converge on a single row instead of forking siblings.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_publishers_email_nonshadow
        ON publishers(email) WHERE account_status != 'shadow'
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_publishers_email_shadow
        ON publishers(email) WHERE account_status = 'shadow'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS websites (
            id TEXT PRIMARY KEY,
            domain TEXT NOT NULL UNIQUE,
            source TEXT NOT NULL DEFAULT 'email_extraction',
            status TEXT NOT NULL DEFAULT 'shadow',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publisher_websites (
            publisher_id TEXT NOT NULL,
            website_id TEXT NOT NULL,
            added_at TEXT NOT NULL,
            UNIQUE(publisher_id, website_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publisher_offerings (
            id TEXT PRIMARY KEY,
            publisher_id TEXT NOT NULL,
            offering_type TEXT NOT NULL,
            base_price INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            turnaround_days INTEGER,
            availability INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'shadow',
            confidence REAL,
            updated_at TEXT NOT NULL,
            UNIQUE(publisher_id, offering_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS offering_websites (
            offering_id TEXT NOT NULL,
            website_id TEXT NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            UNIQUE(offering_id, website_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_queue (
            id TEXT PRIMARY KEY,
            log_id TEXT NOT NULL UNIQUE,
            reason TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'normal',
            auto_approve_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS claim_history (
            id TEXT PRIMARY KEY,
            publisher_id TEXT NOT NULL,
            action TEXT NOT NULL,
            success INTEGER NOT NULL,
            failure_reason TEXT,
            ip TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS automation_log (
            id TEXT PRIMARY KEY,
            publisher_id TEXT,
            log_id TEXT,
            action TEXT NOT NULL,
            match_method TEXT,
            confidence REAL,
            metadata TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_log_status ON processing_log(status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_publishers_token ON publishers(invitation_token)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}
