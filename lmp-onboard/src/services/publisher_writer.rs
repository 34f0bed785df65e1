//! Publisher writer
//!
//! Commits an extraction into publisher/website/offering rows. Two
//! branches: brand-new shadow publisher, or update of an existing account.
//! Both are idempotent under duplicate webhook delivery (links are
//! ON CONFLICT DO NOTHING, offerings are keyed upserts, the shadow insert
//! is absorbed by a unique index) and both finish with exactly one
//! automation_log row describing what happened.
//!
//! A second email from a sender who already has a shadow row merges into
//! that row rather than creating a sibling: the matcher won't return shadow
//! rows for email matches, so the writer does its own shadow lookup first.

use lmp_common::domain::normalize_domain;
use lmp_common::Result;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ConfidenceThresholds;
use crate::db::{automation_log, offerings, publishers, websites};
use crate::models::{AccountStatus, ExtractionResult, Publisher};
use crate::services::publisher_matcher::{self, MatchMethod};

const SOURCE: &str = "email_extraction";

/// What the writer did, for the pipeline's log line.
#[derive(Debug)]
pub struct WriteReport {
    pub publisher_id: Uuid,
    pub created: bool,
    pub websites_linked: usize,
    pub offerings_written: usize,
}

/// Commit an extraction for the given sender.
pub async fn commit(
    pool: &SqlitePool,
    log_id: Uuid,
    sender_email: &str,
    extraction: &ExtractionResult,
    thresholds: &ConfidenceThresholds,
) -> Result<WriteReport> {
    let matched = publisher_matcher::find_existing(pool, sender_email, &extraction.websites).await?;

    if let Some(outcome) = matched {
        return update_existing(pool, log_id, outcome.publisher, outcome.method, extraction, thresholds)
            .await;
    }

    // Shadow merge: same sender seen before, row not yet claimed.
    if let Some(shadow) = publishers::find_by_email_in_statuses(
        pool,
        sender_email,
        &[AccountStatus::Shadow],
    )
    .await?
    {
        return update_existing(pool, log_id, shadow, MatchMethod::ExactEmail, extraction, thresholds)
            .await;
    }

    create_shadow(pool, log_id, sender_email, extraction, thresholds).await
}

async fn create_shadow(
    pool: &SqlitePool,
    log_id: Uuid,
    sender_email: &str,
    extraction: &ExtractionResult,
    thresholds: &ConfidenceThresholds,
) -> Result<WriteReport> {
    let inserted = publishers::insert_shadow(
        pool,
        sender_email,
        extraction.publisher.contact_name.as_deref(),
        extraction.publisher.company_name.as_deref(),
        extraction.publisher.confidence,
        SOURCE,
    )
    .await?;

    let Some(publisher_id) = inserted else {
        // A concurrent commit for the same sender inserted first. Merge
        // into that row through the update branch.
        let shadow = publishers::find_by_email_in_statuses(
            pool,
            sender_email,
            &[AccountStatus::Shadow],
        )
        .await?
        .ok_or_else(|| {
            lmp_common::Error::Internal(format!(
                "Shadow row for {} vanished between insert and read",
                sender_email
            ))
        })?;
        return update_existing(pool, log_id, shadow, MatchMethod::ExactEmail, extraction, thresholds)
            .await;
    };

    let website_ids = link_websites(pool, publisher_id, extraction).await?;
    let offerings_written =
        write_offerings(pool, publisher_id, &website_ids, extraction, thresholds, None).await?;

    automation_log::record(
        pool,
        Some(publisher_id),
        Some(log_id),
        "create_shadow_publisher",
        None,
        extraction.overall_confidence,
        &json!({
            "email": sender_email,
            "websites_linked": website_ids.len(),
            "offerings_written": offerings_written,
        }),
    )
    .await?;

    info!(
        "Created shadow publisher {} for {} ({} websites, {} offerings)",
        publisher_id,
        sender_email,
        website_ids.len(),
        offerings_written
    );

    Ok(WriteReport {
        publisher_id,
        created: true,
        websites_linked: website_ids.len(),
        offerings_written,
    })
}

async fn update_existing(
    pool: &SqlitePool,
    log_id: Uuid,
    publisher: Publisher,
    method: MatchMethod,
    extraction: &ExtractionResult,
    thresholds: &ConfidenceThresholds,
) -> Result<WriteReport> {
    let mut contact_updated = false;

    // Never regress good data with a weak guess: contact/company only move
    // when the new extraction is more confident than what produced the
    // stored values.
    let stored_confidence = publisher.confidence.unwrap_or(0.0);
    if extraction.publisher.confidence > stored_confidence {
        let contact = extraction
            .publisher
            .contact_name
            .as_deref()
            .or(publisher.contact_name.as_deref());
        let company = extraction
            .publisher
            .company_name
            .as_deref()
            .or(publisher.company_name.as_deref());
        publishers::update_contact_fields(
            pool,
            publisher.id,
            contact,
            company,
            extraction.publisher.confidence,
        )
        .await?;
        contact_updated = true;
    } else {
        debug!(
            "Keeping contact fields of {} (stored confidence {} >= new {})",
            publisher.id, stored_confidence, extraction.publisher.confidence
        );
    }

    let website_ids = link_websites(pool, publisher.id, extraction).await?;
    let offerings_written = write_offerings(
        pool,
        publisher.id,
        &website_ids,
        extraction,
        thresholds,
        Some(&publisher),
    )
    .await?;

    automation_log::record(
        pool,
        Some(publisher.id),
        Some(log_id),
        "update_publisher",
        Some(method.as_str()),
        extraction.overall_confidence,
        &json!({
            "email": publisher.email,
            "contact_updated": contact_updated,
            "websites_linked": website_ids.len(),
            "offerings_written": offerings_written,
        }),
    )
    .await?;

    Ok(WriteReport {
        publisher_id: publisher.id,
        created: false,
        websites_linked: website_ids.len(),
        offerings_written,
    })
}

/// Find-or-create each parsed website and link it. Unnormalizable domains
/// are skipped, not fatal.
async fn link_websites(
    pool: &SqlitePool,
    publisher_id: Uuid,
    extraction: &ExtractionResult,
) -> Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for parsed in &extraction.websites {
        let Some(domain) = normalize_domain(&parsed.domain) else {
            debug!("Skipping unnormalizable website {:?}", parsed.domain);
            continue;
        };
        let website_id = websites::find_or_create(pool, &domain, SOURCE).await?;
        websites::link_publisher(pool, publisher_id, website_id).await?;
        ids.push(website_id);
    }
    Ok(ids)
}

/// Upsert offerings that clear the confidence floor. On the update branch
/// an existing offering is only overwritten when the new per-field
/// confidence is at least as good as the stored one.
async fn write_offerings(
    pool: &SqlitePool,
    publisher_id: Uuid,
    website_ids: &[Uuid],
    extraction: &ExtractionResult,
    thresholds: &ConfidenceThresholds,
    existing: Option<&Publisher>,
) -> Result<usize> {
    let mut written = 0;
    for offering in &extraction.offerings {
        if offering.confidence < thresholds.min_offering_confidence {
            debug!(
                "Skipping offering {} below confidence floor ({} < {})",
                offering.offering_type, offering.confidence, thresholds.min_offering_confidence
            );
            continue;
        }

        if existing.is_some() {
            let stored =
                offerings::stored_confidence(pool, publisher_id, &offering.offering_type).await?;
            if let Some(stored) = stored {
                if offering.confidence < stored {
                    debug!(
                        "Keeping offering {} of {} (stored confidence {} > new {})",
                        offering.offering_type, publisher_id, stored, offering.confidence
                    );
                    continue;
                }
            }
        }

        let offering_id = offerings::upsert(
            pool,
            publisher_id,
            &offering.offering_type,
            offering.base_price_cents,
            &offering.currency,
            offering.turnaround_days,
            offering.confidence,
        )
        .await?;

        for (i, website_id) in website_ids.iter().enumerate() {
            offerings::link_website(pool, offering_id, *website_id, i == 0).await?;
        }

        written += 1;
    }
    Ok(written)
}
