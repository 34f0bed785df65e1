//! Claim service
//!
//! The one-time flow by which the real owner of a shadow publisher sets
//! credentials and activates the account:
//!
//! `shadow --(valid unexpired token)--> preview --(valid submit)--> active`
//!
//! Activation is effectively single-use: the final UPDATE re-checks
//! `account_status = 'shadow'` at commit time, so of two concurrent submits
//! with the same token exactly one wins and the other gets `Invalid`.
//! Every attempt, successful or not, lands in claim_history.

use chrono::{DateTime, Duration, Utc};
use lmp_common::auth;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::ClaimConfig;
use crate::db::{claim_history, publishers};
use crate::models::{AccountStatus, Publisher};
use crate::services::migration::{self, MigrationReport};

const MIN_PASSWORD_LEN: usize = 8;

/// Machine-readable claim rejection. The HTTP layer maps these onto
/// 404 / 410 / 429 / 400 for UI messaging.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Unknown token, or the account is no longer claimable
    #[error("Invalid or unknown claim token")]
    Invalid,
    /// Token exists but its expiry has passed
    #[error("Invitation token expired")]
    Expired,
    /// Attempt cap reached inside the lockout window
    #[error("Too many claim attempts")]
    Locked { retry_after_secs: i64 },
    /// Bad submission content (weak password, missing name)
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] lmp_common::Error),
}

/// Redacted preview shown before credentials are set: a fixed field set,
/// nothing operational (no token state, no attempt counts).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPreview {
    pub email: String,
    pub contact_name: Option<String>,
    pub company_name: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ClaimSubmission {
    pub token: String,
    pub password: String,
    pub contact_name: String,
    pub company_name: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClaimOutcome {
    pub publisher_id: Uuid,
    pub migration: MigrationReport,
}

/// Token-gated preview. Enforces the same expiry and lockout rules as
/// submission so the UI learns about a locked account before asking for a
/// password.
pub async fn preview(
    pool: &SqlitePool,
    config: &ClaimConfig,
    token: &str,
) -> Result<ClaimPreview, ClaimError> {
    let publisher = load_claimable(pool, config, token, Mutate::No).await?;

    Ok(ClaimPreview {
        email: publisher.email,
        contact_name: publisher.contact_name,
        company_name: publisher.company_name,
        source: publisher.source,
        created_at: publisher.created_at,
    })
}

/// Finalize activation.
pub async fn submit(
    pool: &SqlitePool,
    config: &ClaimConfig,
    submission: ClaimSubmission,
) -> Result<ClaimOutcome, ClaimError> {
    let publisher = match load_claimable(pool, config, &submission.token, Mutate::Yes).await {
        Ok(publisher) => publisher,
        Err(err) => {
            // Failed submissions are stamped and audited even when the
            // token itself is the problem, as long as it maps to a row.
            let reason = match &err {
                ClaimError::Expired => Some("token_expired"),
                ClaimError::Locked { .. } => Some("locked_out"),
                ClaimError::Invalid => Some("invalid_token"),
                _ => None,
            };
            if let (Some(reason), Ok(Some(publisher))) = (
                reason,
                publishers::find_by_token(pool, &submission.token).await,
            ) {
                record_failure(pool, &publisher, &submission, reason).await;
            }
            return Err(err);
        }
    };

    if let Err(reason) = validate_submission(&submission) {
        record_failure(pool, &publisher, &submission, &reason).await;
        return Err(ClaimError::Validation(reason));
    }

    let salt = auth::generate_salt();
    let hash = auth::hash_password(&submission.password, &salt);

    let activated = publishers::activate(
        pool,
        publisher.id,
        &hash,
        &salt,
        &submission.contact_name,
        submission.company_name.as_deref(),
    )
    .await?;

    if !activated {
        // Lost the race: someone else completed the claim between our
        // validity check and the guarded update.
        record_failure(pool, &publisher, &submission, "already_claimed").await;
        return Err(ClaimError::Invalid);
    }

    let _ = claim_history::record(
        pool,
        publisher.id,
        "claim_completed",
        true,
        None,
        submission.ip.as_deref(),
        submission.user_agent.as_deref(),
    )
    .await;

    info!("Publisher {} claimed and activated", publisher.id);

    // Synchronous, but failure here never rolls back the activation: the
    // owner must be able to log in even if the one-time promotion was
    // partial.
    let migration = migration::migrate(pool, publisher.id).await;

    Ok(ClaimOutcome {
        publisher_id: publisher.id,
        migration,
    })
}

/// Whether the loader may write state. Preview is a read endpoint and must
/// stay one; only submit resets an elapsed lockout window.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mutate {
    No,
    Yes,
}

/// Shared token/expiry/lockout validation for preview and submit.
async fn load_claimable(
    pool: &SqlitePool,
    config: &ClaimConfig,
    token: &str,
    mutate: Mutate,
) -> Result<Publisher, ClaimError> {
    if token.trim().is_empty() {
        return Err(ClaimError::Invalid);
    }

    let publisher = publishers::find_by_token(pool, token)
        .await?
        .ok_or(ClaimError::Invalid)?;

    if publisher.account_status != AccountStatus::Shadow {
        return Err(ClaimError::Invalid);
    }

    match publisher.invitation_expires_at {
        Some(expires_at) if expires_at < Utc::now() => return Err(ClaimError::Expired),
        Some(_) => {}
        None => return Err(ClaimError::Invalid),
    }

    if publisher.claim_attempts >= config.max_attempts {
        let window_end = publisher
            .last_claim_attempt_at
            .unwrap_or(publisher.updated_at)
            + Duration::minutes(config.lockout_minutes);
        let remaining = (window_end - Utc::now()).num_seconds();
        if remaining > 0 {
            return Err(ClaimError::Locked {
                retry_after_secs: remaining,
            });
        }
        // Window elapsed: the cap resets and the owner may try again.
        if mutate == Mutate::Yes {
            publishers::reset_claim_attempts(pool, publisher.id).await?;
        }
    }

    Ok(publisher)
}

fn validate_submission(submission: &ClaimSubmission) -> Result<(), String> {
    if submission.password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if submission.contact_name.trim().is_empty() {
        return Err("contact name is required".to_string());
    }
    Ok(())
}

async fn record_failure(
    pool: &SqlitePool,
    publisher: &Publisher,
    submission: &ClaimSubmission,
    reason: &str,
) {
    let _ = publishers::record_failed_claim_attempt(pool, publisher.id).await;
    let _ = claim_history::record(
        pool,
        publisher.id,
        "claim_attempt",
        false,
        Some(reason),
        submission.ip.as_deref(),
        submission.user_agent.as_deref(),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();
        pool
    }

    async fn shadow_with_token(pool: &SqlitePool, token: &str, expires_in_days: i64) -> Uuid {
        let id = db::publishers::insert_shadow(
            pool,
            "owner@example.com",
            Some("Pat"),
            Some("Example Media"),
            0.9,
            "test",
        )
        .await
        .unwrap()
        .unwrap();
        db::publishers::set_invitation(
            pool,
            id,
            token,
            Utc::now() + Duration::days(expires_in_days),
            Utc::now(),
        )
        .await
        .unwrap();
        id
    }

    fn submission(token: &str, password: &str) -> ClaimSubmission {
        ClaimSubmission {
            token: token.to_string(),
            password: password.to_string(),
            contact_name: "Pat Doe".to_string(),
            company_name: Some("Example Media".to_string()),
            ip: Some("203.0.113.9".to_string()),
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[tokio::test]
    async fn preview_shows_redacted_fields() {
        let pool = pool().await;
        shadow_with_token(&pool, "tok-1", 30).await;

        let preview = preview(&pool, &ClaimConfig::default(), "tok-1").await.unwrap();
        assert_eq!(preview.email, "owner@example.com");
        assert_eq!(preview.contact_name.as_deref(), Some("Pat"));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let pool = pool().await;
        assert!(matches!(
            preview(&pool, &ClaimConfig::default(), "nope").await,
            Err(ClaimError::Invalid)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_gone() {
        let pool = pool().await;
        shadow_with_token(&pool, "tok-old", -1).await;
        assert!(matches!(
            preview(&pool, &ClaimConfig::default(), "tok-old").await,
            Err(ClaimError::Expired)
        ));
    }

    #[tokio::test]
    async fn expired_submission_is_stamped_and_audited() {
        let pool = pool().await;
        let id = shadow_with_token(&pool, "tok-exp", -1).await;

        let err = submit(&pool, &ClaimConfig::default(), submission("tok-exp", "s3cretpass"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::Expired));

        let publisher = db::publishers::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(publisher.claim_attempts, 1);
        assert!(publisher.last_claim_attempt_at.is_some());

        let history: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM claim_history WHERE publisher_id = ? AND failure_reason = 'token_expired'",
        )
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(history, 1);
    }

    #[tokio::test]
    async fn locked_submission_is_audited() {
        let pool = pool().await;
        let id = shadow_with_token(&pool, "tok-aud", 30).await;
        let config = ClaimConfig {
            max_attempts: 1,
            ..Default::default()
        };

        let _ = submit(&pool, &config, submission("tok-aud", "short")).await;
        let err = submit(&pool, &config, submission("tok-aud", "s3cretpass"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::Locked { .. }));

        let history: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM claim_history WHERE publisher_id = ? AND failure_reason = 'locked_out'",
        )
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(history, 1);
    }

    #[tokio::test]
    async fn preview_never_mutates_claim_state() {
        let pool = pool().await;
        let id = shadow_with_token(&pool, "tok-ro", 30).await;
        let config = ClaimConfig {
            max_attempts: 1,
            lockout_minutes: 0,
            ..Default::default()
        };

        let _ = submit(&pool, &config, submission("tok-ro", "short")).await;

        // The zero-length window has elapsed; a preview sees a claimable
        // account but must not reset the counter itself.
        preview(&pool, &config, "tok-ro").await.unwrap();
        let publisher = db::publishers::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(publisher.claim_attempts, 1);
    }

    #[tokio::test]
    async fn successful_claim_activates_and_migrates() {
        let pool = pool().await;
        let id = shadow_with_token(&pool, "tok-2", 30).await;
        let site = db::websites::find_or_create(&pool, "example.com", "test").await.unwrap();
        db::websites::link_publisher(&pool, id, site).await.unwrap();
        db::offerings::upsert(&pool, id, "guest_post", 30000, "USD", Some(2), 0.9)
            .await
            .unwrap();

        let outcome = submit(&pool, &ClaimConfig::default(), submission("tok-2", "s3cretpass"))
            .await
            .unwrap();
        assert_eq!(outcome.publisher_id, id);
        assert_eq!(outcome.migration.websites_migrated, 1);
        assert_eq!(outcome.migration.offerings_activated, 1);

        let publisher = db::publishers::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(publisher.account_status, AccountStatus::Active);
        assert!(publisher.invitation_token.is_none());
        assert!(publisher.claimed_at.is_some());
        assert_eq!(publisher.claim_attempts, 0);
    }

    #[tokio::test]
    async fn claim_is_single_use() {
        let pool = pool().await;
        shadow_with_token(&pool, "tok-3", 30).await;

        submit(&pool, &ClaimConfig::default(), submission("tok-3", "s3cretpass"))
            .await
            .unwrap();
        // Token cleared on activation, so the second submission is invalid
        assert!(matches!(
            submit(&pool, &ClaimConfig::default(), submission("tok-3", "s3cretpass")).await,
            Err(ClaimError::Invalid)
        ));
    }

    #[tokio::test]
    async fn short_password_counts_an_attempt() {
        let pool = pool().await;
        let id = shadow_with_token(&pool, "tok-4", 30).await;

        let err = submit(&pool, &ClaimConfig::default(), submission("tok-4", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::Validation(_)));

        let publisher = db::publishers::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(publisher.claim_attempts, 1);
        assert_eq!(publisher.account_status, AccountStatus::Shadow);
    }

    #[tokio::test]
    async fn lockout_rejects_even_valid_submissions() {
        let pool = pool().await;
        shadow_with_token(&pool, "tok-5", 30).await;
        let config = ClaimConfig {
            max_attempts: 2,
            ..Default::default()
        };

        for _ in 0..2 {
            let _ = submit(&pool, &config, submission("tok-5", "short")).await;
        }

        // Cap reached inside the window: a now-correct submission still 429s
        match submit(&pool, &config, submission("tok-5", "s3cretpass")).await {
            Err(ClaimError::Locked { retry_after_secs }) => {
                assert!(retry_after_secs > 0);
            }
            other => panic!("expected Locked, got {:?}", other.map(|o| o.publisher_id)),
        }
    }

    #[tokio::test]
    async fn lockout_expires_with_the_window() {
        let pool = pool().await;
        let id = shadow_with_token(&pool, "tok-6", 30).await;
        let config = ClaimConfig {
            max_attempts: 1,
            lockout_minutes: 0,
            ..Default::default()
        };

        let _ = submit(&pool, &config, submission("tok-6", "short")).await;
        // Zero-length window: immediately claimable again
        let outcome = submit(&pool, &config, submission("tok-6", "s3cretpass")).await.unwrap();
        assert_eq!(outcome.publisher_id, id);
    }
}
