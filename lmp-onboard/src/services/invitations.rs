//! Invitation dispatcher
//!
//! Generates claim tokens and sends activation emails to shadow publishers.
//! Single sends carry a 24h idempotency guard. Bulk sends are a bounded,
//! sequential, rate-limited loop: outbound email providers throttle hard,
//! so there is no parallel fan-out here.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use lmp_common::{auth, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error as ThisError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::InvitationConfig;
use crate::db::{automation_log, publishers};
use crate::models::AccountStatus;

/// Outbound message handed to the email transport collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug)]
pub struct SendReceipt {
    pub provider_message_id: Option<String>,
}

#[derive(Debug, ThisError)]
#[error("Email transport failed: {0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> std::result::Result<SendReceipt, TransportError>;
}

/// Stand-in transport that logs instead of sending. The production mailer
/// lives in the platform's notification service; this keeps the pipeline
/// runnable without it.
pub struct TracingTransport;

#[async_trait]
impl EmailTransport for TracingTransport {
    async fn send(&self, email: &OutboundEmail) -> std::result::Result<SendReceipt, TransportError> {
        info!("Would send invitation to {} ({})", email.to, email.subject);
        Ok(SendReceipt {
            provider_message_id: None,
        })
    }
}

/// Outcome of a single invitation.
#[derive(Debug, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    /// An invitation already went out within the cooldown window
    SkippedRecentlyInvited,
}

/// Result summary of a bulk run.
#[derive(Debug, Default, Serialize)]
pub struct BulkReport {
    pub sent: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub total_eligible: i64,
}

/// Send (or refresh) one publisher's invitation.
pub async fn send_invitation(
    pool: &SqlitePool,
    config: &InvitationConfig,
    transport: &dyn EmailTransport,
    publisher_id: Uuid,
) -> Result<SendStatus> {
    let publisher = publishers::find_by_id(pool, publisher_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("publisher {}", publisher_id)))?;

    if publisher.account_status != AccountStatus::Shadow {
        return Err(Error::InvalidInput(format!(
            "publisher {} is {}, only shadow accounts get invitations",
            publisher_id,
            publisher.account_status.as_str()
        )));
    }

    // Idempotency guard: a recent invitation makes this a no-op.
    if let Some(sent_at) = publisher.invitation_sent_at {
        if Utc::now() - sent_at < Duration::hours(config.resend_cooldown_hours) {
            info!(
                "Skipping invitation for {}: sent {} (inside {}h cooldown)",
                publisher_id, sent_at, config.resend_cooldown_hours
            );
            return Ok(SendStatus::SkippedRecentlyInvited);
        }
    }

    let token = publisher
        .invitation_token
        .unwrap_or_else(auth::generate_token);
    let expires_at = Utc::now() + Duration::days(config.token_ttl_days);

    let claim_url = format!("{}?token={}", config.claim_base_url, token);
    let email = OutboundEmail {
        from: config.from_address.clone(),
        to: publisher.email.clone(),
        subject: "Your publisher profile on Linkmart is ready to claim".to_string(),
        html: invitation_body(publisher.contact_name.as_deref(), &claim_url),
    };

    transport
        .send(&email)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    publishers::set_invitation(pool, publisher_id, &token, expires_at, Utc::now()).await?;

    let _ = automation_log::record(
        pool,
        Some(publisher_id),
        None,
        "send_invitation",
        None,
        1.0,
        &serde_json::json!({ "to": publisher.email }),
    )
    .await;

    info!("Invitation sent to {} for publisher {}", publisher.email, publisher_id);
    Ok(SendStatus::Sent)
}

/// Send invitations to a batch of eligible shadow publishers: never
/// invited, or last invited longer than the re-invite window ago.
/// Sequential by design; the limiter paces sends to provider throughput.
pub async fn send_bulk_invitations(
    pool: &SqlitePool,
    config: &InvitationConfig,
    transport: &dyn EmailTransport,
    ids: Option<Vec<Uuid>>,
    batch_size: Option<u32>,
) -> Result<BulkReport> {
    let batch_size = batch_size.unwrap_or(config.default_batch_size);
    let mut report = BulkReport {
        total_eligible: publishers::count_eligible_for_invitation(
            pool,
            config.reinvite_after_days,
        )
        .await?,
        ..Default::default()
    };

    let targets: Vec<Uuid> = match ids {
        Some(ids) => ids.into_iter().take(batch_size as usize).collect(),
        None => publishers::eligible_for_invitation(pool, config.reinvite_after_days, batch_size)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
    };

    let per_second = std::num::NonZeroU32::new(config.sends_per_second.max(1))
        .unwrap_or(std::num::NonZeroU32::MIN);
    let limiter = governor::RateLimiter::direct(governor::Quota::per_second(per_second));

    for publisher_id in targets {
        limiter.until_ready().await;

        match send_invitation(pool, config, transport, publisher_id).await {
            Ok(SendStatus::Sent) => report.sent += 1,
            Ok(SendStatus::SkippedRecentlyInvited) => {}
            Err(e) => {
                warn!("Invitation to {} failed: {}", publisher_id, e);
                report.failed += 1;
                report.errors.push(format!("{}: {}", publisher_id, e));
            }
        }
    }

    info!(
        "Bulk invitations: {} sent, {} failed, {} eligible overall",
        report.sent, report.failed, report.total_eligible
    );
    Ok(report)
}

fn invitation_body(contact_name: Option<&str>, claim_url: &str) -> String {
    let greeting = match contact_name {
        Some(name) => format!("Hi {},", name),
        None => "Hi,".to_string(),
    };
    format!(
        "<p>{}</p>\
         <p>We set up a publisher profile from your recent correspondence. \
         Claim it to manage your websites and offerings:</p>\
         <p><a href=\"{}\">Claim your profile</a></p>\
         <p>This link expires and can only be used once.</p>",
        greeting, claim_url
    )
}
